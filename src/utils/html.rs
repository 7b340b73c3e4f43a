use std::collections::HashSet;

/// Sanitizes post bodies using the ammonia whitelist.
///
/// Safe formatting tags (<b>, <p>, <a>...) survive; <script>, <iframe> and
/// event-handler attributes are stripped. Guards against stored XSS in clients
/// that render post HTML directly.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Strips every tag, keeping only text. Comments are plain text.
pub fn strip_tags(input: &str) -> String {
    ammonia::Builder::default()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_html_drops_scripts_keeps_formatting() {
        let out = clean_html("<p>hi <b>there</b></p><script>alert(1)</script>");
        assert!(out.contains("<b>there</b>"));
        assert!(!out.contains("script"));
    }

    #[test]
    fn strip_tags_leaves_text_only() {
        let out = strip_tags("<i>nice</i> post");
        assert_eq!(out, "nice post");
    }
}
