// src/config/sites.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::subject::SubjectKind;

pub const ENV_SITES_PATH: &str = "SCRAPE_SITES_PATH";

const SCHOLARSHIP_PROMPT: &str = "List all the master's scholarships available in Canada with their \
     respective program_title, funded_by (who manages or funds it), url, deadline and requirements.";
const NEWS_PROMPT: &str = "List the latest news articles about scholarships, student funding and \
     higher education with their title, summary, url and published_at date.";

/// One site to scrape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteTarget {
    pub url: String,
    #[serde(default = "default_kind")]
    pub kind: SubjectKind,
    /// Overrides the default extraction prompt for `kind`.
    #[serde(default)]
    pub prompt: Option<String>,
}

fn default_kind() -> SubjectKind {
    SubjectKind::Scholarship
}

impl SiteTarget {
    pub fn scholarship(url: &str) -> Self {
        Self {
            url: url.to_string(),
            kind: SubjectKind::Scholarship,
            prompt: None,
        }
    }

    pub fn prompt(&self) -> String {
        match self.prompt.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => match self.kind {
                SubjectKind::Scholarship => SCHOLARSHIP_PROMPT.to_string(),
                SubjectKind::News => NEWS_PROMPT.to_string(),
            },
        }
    }
}

/// Built-in list used when no site config is found.
pub fn default_sites() -> Vec<SiteTarget> {
    vec![SiteTarget::scholarship("https://yconic.com")]
}

/// Load sites from an explicit path. Supports TOML or JSON formats.
pub fn load_sites_from(path: &Path) -> Result<Vec<SiteTarget>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sites from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sites(&content, ext.as_str())
}

/// Load sites using env var + fallbacks:
/// 1) $SCRAPE_SITES_PATH
/// 2) config/sites.toml
/// 3) config/sites.json
/// 4) built-in defaults
pub fn load_sites_default() -> Result<Vec<SiteTarget>> {
    if let Ok(p) = std::env::var(ENV_SITES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sites_from(&pb);
        } else {
            return Err(anyhow!("{ENV_SITES_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sites.toml");
    if toml_p.exists() {
        return load_sites_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sites.json");
    if json_p.exists() {
        return load_sites_from(&json_p);
    }
    Ok(default_sites())
}

fn parse_sites(s: &str, hint_ext: &str) -> Result<Vec<SiteTarget>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sites]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sites format"))
}

fn parse_toml(s: &str) -> Result<Vec<SiteTarget>> {
    #[derive(Deserialize)]
    struct TomlSites {
        sites: Vec<SiteTarget>,
    }
    let v: TomlSites = toml::from_str(s)?;
    Ok(clean_list(v.sites))
}

/// JSON accepts either a list of objects or a plain list of URLs.
fn parse_json(s: &str) -> Result<Vec<SiteTarget>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Url(String),
        Site(SiteTarget),
    }
    let v: Vec<Entry> = serde_json::from_str(s)?;
    Ok(clean_list(
        v.into_iter()
            .map(|e| match e {
                Entry::Url(u) => SiteTarget::scholarship(&u),
                Entry::Site(t) => t,
            })
            .collect(),
    ))
}

/// Trim URLs, drop empties, collapse duplicate URLs (first entry wins).
fn clean_list(items: Vec<SiteTarget>) -> Vec<SiteTarget> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.url = it.url.trim().to_string();
        if it.url.is_empty() || !seen.insert(it.url.clone()) {
            continue;
        }
        out.push(it);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_and_json_formats_work() {
        let toml = r#"
            [[sites]]
            url = " https://yconic.com "

            [[sites]]
            url = "https://yconic.com"

            [[sites]]
            url = "https://news.example/edu"
            kind = "news"
        "#;
        let out = parse_toml(toml).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://yconic.com");
        assert_eq!(out[1].kind, SubjectKind::News);

        let json = r#"["https://a.example", {"url": "https://b.example", "kind": "news", "prompt": "custom"}, ""]"#;
        let out = parse_json(json).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, SubjectKind::Scholarship);
        assert_eq!(out[1].prompt(), "custom");
    }

    #[test]
    fn default_prompt_depends_on_kind() {
        let s = SiteTarget::scholarship("https://x");
        assert!(s.prompt().contains("scholarships"));
        let n = SiteTarget {
            kind: SubjectKind::News,
            ..s
        };
        assert!(n.prompt().contains("news articles"));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_SITES_PATH);

        // No files in temp CWD → built-in defaults
        let v = load_sites_default().unwrap();
        assert_eq!(v, default_sites());

        // Env takes precedence
        let p_json = tmp.path().join("sites.json");
        fs::write(&p_json, r#"["https://x.example"]"#).unwrap();
        env::set_var(ENV_SITES_PATH, p_json.display().to_string());
        let v2 = load_sites_default().unwrap();
        assert_eq!(v2, vec![SiteTarget::scholarship("https://x.example")]);

        env::set_var(ENV_SITES_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_sites_default().is_err());
        env::remove_var(ENV_SITES_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
