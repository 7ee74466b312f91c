//! Property-based tests for the render pipeline

use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Code lines that cannot close or reopen a fence
fn arb_code_line() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _(){};=+*/<>&\"'#:.,\\[\\]-]{0,40}"
}

fn arb_code() -> impl Strategy<Value = String> {
    proptest::collection::vec(arb_code_line(), 1..8).prop_map(|lines| {
        let mut code = lines.join("\n");
        code.push('\n');
        code
    })
}

fn arb_language() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        Just(None),
        Just(Some("rust")),
        Just(Some("python")),
        Just(Some("js")),
        Just(Some("html")),
        Just(Some("notalanguage")),
    ]
}

/// Prose without fences, meant to follow a word on the same line
fn arb_prose() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?*_<>/=\"-]{0,80}"
}

fn fenced(language: Option<&str>, code: &str) -> String {
    format!("```{}\n{code}```\n", language.unwrap_or_default())
}

/// A script-capable element or an unsafe link target anywhere in the tree
fn contains_forbidden(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => s.to_ascii_lowercase().starts_with("javascript:"),
        serde_json::Value::Array(items) => items.iter().any(contains_forbidden),
        serde_json::Value::Object(map) => {
            let bad_tag = map
                .get("tag")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|tag| tag == "script" || tag == "iframe");
            bad_tag || map.values().any(contains_forbidden)
        }
        _ => false,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Code inside a fence comes back byte-for-byte, highlighted or not
    #[test]
    fn prop_code_block_round_trip(
        language in arb_language(),
        code in arb_code(),
        before in arb_prose(),
    ) {
        let markdown = format!("Intro {before}\n\n{}", fenced(language, &code));
        let document = render_markdown(0, &markdown);

        let blocks = document.code_blocks();
        prop_assert_eq!(blocks.len(), 1);
        prop_assert_eq!(&blocks[0].code, &code);
        prop_assert_eq!(blocks[0].plain_text(), code);
    }

    // Every code block gets a distinct key, numbered in document order
    #[test]
    fn prop_code_keys_are_distinct(
        codes in proptest::collection::vec((arb_language(), arb_code()), 0..5),
        index in 0usize..50,
    ) {
        let markdown: String = codes
            .iter()
            .map(|(language, code)| fenced(*language, code))
            .collect::<Vec<_>>()
            .join("\ntext\n\n");
        let document = render_markdown(index, &markdown);

        let keys: Vec<_> = document.code_blocks().iter().map(|c| c.copy_key).collect();
        let expected: Vec<_> = (0..codes.len())
            .map(|block| CopyKey::Code { message: index, block })
            .collect();
        prop_assert_eq!(keys, expected);
        prop_assert_eq!(document.copy_key, CopyKey::Message(index));
    }

    // Script-capable markup never reaches the output, wherever it appears
    #[test]
    fn prop_script_never_rendered(
        before in arb_prose(),
        after in arb_prose(),
        payload in "[a-z()]{1,12}",
        block in any::<bool>(),
    ) {
        let markup = format!(
            "<script>{payload}</script><iframe src=\"javascript:{payload}\"></iframe><a href=\"javascript:{payload}\">x</a>"
        );
        let markdown = if block {
            format!("{before}\n\n{markup}\n\n{after}")
        } else {
            format!("{before} {markup} {after}")
        };
        let document = render_markdown(0, &markdown);
        let json = serde_json::to_value(&document).unwrap();
        prop_assert!(!contains_forbidden(&json), "forbidden content in {json}");
    }

    // Rendering never panics and user text is passed through untouched
    #[test]
    fn prop_user_message_verbatim(text in "\\PC{0,200}") {
        let view = render_message(0, &Message::user(text.clone()));
        prop_assert_eq!(view, MessageView::Plain { text, copy_key: CopyKey::Message(0) });
    }

    #[test]
    fn prop_render_never_panics(markdown in "\\PC{0,300}") {
        let _ = render_markdown(0, &markdown);
    }
}
