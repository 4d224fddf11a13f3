use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;

static SLUG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\-_]").unwrap());
static HYPHEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// 从标题生成 URL 友好的 slug
pub fn generate_slug(title: &str) -> String {
    let mut slug = title.to_lowercase();

    // 替换空格为连字符
    slug = slug.replace(' ', "-");

    // 移除所有非字母数字和连字符的字符
    slug = SLUG_REGEX.replace_all(&slug, "").to_string();

    // 压缩连续的连字符并去掉首尾
    slug = HYPHEN_RUNS.replace_all(&slug, "-").to_string();
    slug = slug.trim_matches('-').to_string();

    // 限制长度
    if slug.len() > 100 {
        slug = slug.chars().take(100).collect();
        if let Some(last_hyphen) = slug.rfind('-') {
            if last_hyphen > 50 {
                slug = slug[..last_hyphen].to_string();
            }
        }
    }

    if slug.is_empty() {
        slug = "untitled".to_string();
    }

    slug
}

/// slug 加随机后缀，避免同名标题冲突
pub fn generate_unique_slug(title: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();

    format!("{}-{}", generate_slug(title), suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_titles_become_kebab_case() {
        assert_eq!(generate_slug("How to Train Your Dragon"), "how-to-train-your-dragon");
    }

    #[test]
    fn punctuation_is_stripped() {
        assert_eq!(generate_slug("Hello, World!"), "hello-world");
    }

    #[test]
    fn consecutive_separators_collapse() {
        assert_eq!(generate_slug("a  --  b"), "a-b");
    }

    #[test]
    fn empty_input_falls_back_to_untitled() {
        assert_eq!(generate_slug("!!!"), "untitled");
    }

    #[test]
    fn unique_slugs_differ_for_the_same_title() {
        let a = generate_unique_slug("Same Title");
        let b = generate_unique_slug("Same Title");
        assert_ne!(a, b);
        assert!(a.starts_with("same-title-"));
    }
}
