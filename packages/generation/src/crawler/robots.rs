//! robots.txt fetching and rule evaluation.

use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Parsed robots.txt rules for one site.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    /// Rules per user-agent token (lowercase)
    groups: HashMap<String, RuleGroup>,

    /// Rules for the wildcard agent `*`
    wildcard: RuleGroup,

    /// Sitemap URLs listed anywhere in the file
    sitemaps: Vec<String>,
}

/// One user-agent group's rules.
#[derive(Debug, Clone, Default)]
struct RuleGroup {
    /// (path prefix, allowed) pairs in file order
    rules: Vec<(String, bool)>,

    /// Crawl-delay for this group, in seconds
    crawl_delay: Option<f64>,
}

impl RuleGroup {
    /// Evaluate a path against this group.
    ///
    /// Longest matching prefix wins; an Allow beats a Disallow of the same
    /// length. No matching rule means allowed.
    fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<(usize, bool)> = None;
        for (prefix, allowed) in &self.rules {
            if !path.starts_with(prefix.as_str()) {
                continue;
            }
            let len = prefix.len();
            match best {
                Some((best_len, best_allowed)) => {
                    if len > best_len || (len == best_len && *allowed && !best_allowed) {
                        best = Some((len, *allowed));
                    }
                }
                None => best = Some((len, *allowed)),
            }
        }
        best.map(|(_, allowed)| allowed).unwrap_or(true)
    }
}

impl RobotsTxt {
    /// Parse robots.txt content.
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        // Agents the current group applies to; reset whenever a user-agent
        // line follows a rule line.
        let mut current_agents: Vec<String> = Vec::new();
        let mut in_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_ascii_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if in_rules {
                        current_agents.clear();
                        in_rules = false;
                    }
                    current_agents.push(value.to_ascii_lowercase());
                }
                "disallow" | "allow" => {
                    in_rules = true;
                    if value.is_empty() {
                        continue;
                    }
                    let allowed = directive == "allow";
                    for agent in &current_agents {
                        robots
                            .group_mut(agent)
                            .rules
                            .push((value.to_string(), allowed));
                    }
                }
                "crawl-delay" => {
                    in_rules = true;
                    if let Ok(delay) = value.parse::<f64>() {
                        for agent in &current_agents {
                            robots.group_mut(agent).crawl_delay = Some(delay);
                        }
                    }
                }
                "sitemap" => {
                    robots.sitemaps.push(value.to_string());
                }
                _ => {}
            }
        }

        robots
    }

    fn group_mut(&mut self, agent: &str) -> &mut RuleGroup {
        if agent == "*" {
            &mut self.wildcard
        } else {
            self.groups.entry(agent.to_string()).or_default()
        }
    }

    /// Find the group for a user agent, falling back to the wildcard group.
    ///
    /// Matching is case-insensitive substring: the group token `llmstxt`
    /// matches the agent `llmstxt-generator/0.1.0`.
    fn group_for(&self, user_agent: &str) -> &RuleGroup {
        let agent = user_agent.to_ascii_lowercase();
        self.groups
            .iter()
            .find(|(token, _)| agent.contains(token.as_str()))
            .map(|(_, group)| group)
            .unwrap_or(&self.wildcard)
    }

    /// Whether the user agent may fetch the given URL path.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };
        self.group_for(user_agent).is_allowed(path)
    }

    /// Crawl delay for the user agent, if declared.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.group_for(user_agent)
            .crawl_delay
            .or(self.wildcard.crawl_delay)
            .map(Duration::from_secs_f64)
    }

    /// Sitemap URLs listed in the file.
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Whether the user agent is barred from the whole site.
    pub fn disallows_all(&self, user_agent: &str) -> bool {
        !self.is_allowed(user_agent, "/")
    }
}

/// Fetch and parse robots.txt for a site.
///
/// Unreachable or non-success responses degrade to allow-all with a
/// warning, per the crawl contract.
pub async fn fetch_robots(client: &reqwest::Client, site: &url::Url, user_agent: &str) -> RobotsTxt {
    let robots_url = match site.join("/robots.txt") {
        Ok(u) => u,
        Err(_) => return RobotsTxt::default(),
    };

    match client
        .get(robots_url.clone())
        .header("User-Agent", user_agent)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => RobotsTxt::parse(&body),
            Err(e) => {
                warn!(url = %robots_url, error = %e, "failed reading robots.txt body, allowing all");
                RobotsTxt::default()
            }
        },
        Ok(response) => {
            warn!(url = %robots_url, status = %response.status(), "robots.txt not available, allowing all");
            RobotsTxt::default()
        }
        Err(e) => {
            warn!(url = %robots_url, error = %e, "robots.txt unreachable, allowing all");
            RobotsTxt::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let content = r#"
User-agent: *
Disallow: /private/
Disallow: /admin/
Allow: /public/
Crawl-delay: 2

Sitemap: https://example.com/sitemap.xml
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(robots.is_allowed("TestBot", "/public/page"));
        assert!(!robots.is_allowed("TestBot", "/private/page"));
        assert!(!robots.is_allowed("TestBot", "/admin/"));
        assert!(robots.is_allowed("TestBot", "/other/page"));

        assert_eq!(robots.crawl_delay("TestBot"), Some(Duration::from_secs(2)));
        assert_eq!(robots.sitemaps().len(), 1);
    }

    #[test]
    fn test_specific_user_agent_overrides_wildcard() {
        let content = r#"
User-agent: *
Disallow: /

User-agent: goodbot
Allow: /
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("BadBot/2.0", "/page"));
        assert!(robots.is_allowed("GoodBot/1.0", "/page"));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let content = r#"
User-agent: *
Disallow: /docs/
Allow: /docs/public/
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("Bot", "/docs/internal/secret"));
        assert!(robots.is_allowed("Bot", "/docs/public/page"));
        assert!(robots.is_allowed("Bot", "/elsewhere"));
    }

    #[test]
    fn test_shared_group_for_multiple_agents() {
        let content = r#"
User-agent: alpha
User-agent: beta
Disallow: /x/
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("alpha-crawler", "/x/1"));
        assert!(!robots.is_allowed("beta-crawler", "/x/1"));
        assert!(robots.is_allowed("gamma-crawler", "/x/1"));
    }

    #[test]
    fn test_comments_and_empty_disallow() {
        let content = r#"
# a comment
User-agent: *   # inline comment
Disallow:
        "#;

        let robots = RobotsTxt::parse(content);
        assert!(robots.is_allowed("AnyBot", "/anything"));
    }

    #[test]
    fn test_empty_robots_allows_all() {
        let robots = RobotsTxt::parse("");
        assert!(robots.is_allowed("AnyBot", "/any/path"));
        assert!(robots.crawl_delay("AnyBot").is_none());
        assert!(!robots.disallows_all("AnyBot"));
    }

    #[test]
    fn test_disallow_all() {
        let content = "User-agent: *\nDisallow: /\n";
        let robots = RobotsTxt::parse(content);
        assert!(robots.disallows_all("Bot"));
        assert!(!robots.is_allowed("Bot", "/anything"));
    }
}
