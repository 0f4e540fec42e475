//! Discovery and crawl: robots.txt, sitemaps, the URL frontier, and the
//! polite HTTP fetcher.

pub mod fetcher;
pub mod frontier;
pub mod robots;
pub mod sitemap;

pub use fetcher::HttpFetcher;
pub use frontier::{canonicalize, same_site, score_url, EnqueueOutcome, Frontier};
pub use robots::{fetch_robots, RobotsTxt};
pub use sitemap::{discover as discover_sitemap, SitemapEntry};
