//! Markup tokenizer producing the linear event stream consumed by [`crate::TreeParser`].
//!
//! Tag names use the ASCII character class `[A-Za-z0-9:_-]`. Attribute names run until
//! whitespace, `/`, `>`, `=` or a quote. Text and attribute values are kept verbatim (no
//! character reference decoding) so that printing a parsed tree reproduces them exactly.
//! A quoted value whose closing quote never comes runs to the next `>`. Once no `>` is
//! left in the input, everything from the current `<` on is text.
//!
//! Known limitations (intentional):
//! - No void-element table: `<br>` is an ordinary start tag. Whether it owns children is
//!   decided later by the parser from the order in which close tags arrive.
//! - A tag split across two `feed` calls is not reassembled.
//! - Rawtext close-tag scanning accepts only ASCII whitespace before `>` (see
//!   `find_rawtext_close_tag`).
use crate::parser::ParserConfig;
use crate::types::{Attributes, Token};
use memchr::{memchr, memrchr};

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

fn starts_with_ignore_ascii_case_at(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

fn is_tag_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

fn is_attr_name_char(c: u8) -> bool {
    !c.is_ascii_whitespace() && !matches!(c, b'/' | b'>' | b'=' | b'"' | b'\'')
}

fn fold_name(raw: &str, config: &ParserConfig) -> String {
    if config.lowercase_names {
        raw.to_ascii_lowercase()
    } else {
        raw.to_string()
    }
}

// it only attempts matches starting at ASCII <
// < cannot appear in UTF-8 continuation bytes
fn find_rawtext_close_tag(haystack: &str, close_tag: &[u8]) -> Option<(usize, usize)> {
    let hay_bytes = haystack.as_bytes();
    let len = hay_bytes.len();
    let n = close_tag.len();
    debug_assert!(n >= 3);
    debug_assert!(close_tag[0] == b'<' && close_tag[1] == b'/');
    if len < n {
        return None;
    }
    let mut i = 0;
    while i + n <= len {
        let rel = memchr(b'<', &hay_bytes[i..])?;
        i += rel;
        if i + n > len {
            return None;
        }
        if hay_bytes[i + 1] == b'/' && starts_with_ignore_ascii_case_at(hay_bytes, i, close_tag) {
            let mut k = i + n;
            while k < len && hay_bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && hay_bytes[k] == b'>' {
                return Some((i, k + 1));
            }
        }
        i += 1;
    }
    None
}

fn push_text(out: &mut Vec<Token>, text: &str) {
    if !text.is_empty() {
        out.push(Token::Text(text.to_string()));
    }
}

struct StartTag {
    name: String,
    attributes: Attributes,
    self_closing: bool,
    /// Byte offset just past the closing `>`.
    end: usize,
}

/// Scans a start tag beginning at `start` (the `<`). Returns `None` when the tag never
/// terminates, in which case the caller keeps the `<` as literal text.
fn scan_start_tag(input: &str, start: usize, config: &ParserConfig) -> Option<StartTag> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let name_start = start + 1;
    let mut k = name_start;
    while k < len && is_tag_name_char(bytes[k]) {
        k += 1;
    }
    debug_assert!(input.is_char_boundary(name_start));
    debug_assert!(input.is_char_boundary(k));
    let name = fold_name(&input[name_start..k], config);
    let mut attributes = Attributes::new();
    let mut self_closing = false;

    let skip_whitespace = |k: &mut usize| {
        while *k < len && bytes[*k].is_ascii_whitespace() {
            *k += 1;
        }
    };

    loop {
        skip_whitespace(&mut k);
        if k >= len {
            return None;
        }
        if bytes[k] == b'>' {
            k += 1;
            break;
        }
        if bytes[k] == b'/' {
            if k + 1 < len && bytes[k + 1] == b'>' {
                self_closing = true;
                k += 2;
                break;
            }
            k += 1;
            continue;
        }
        let attr_start = k;
        while k < len && is_attr_name_char(bytes[k]) {
            k += 1;
        }
        if attr_start == k {
            // stray quote or `=` with no name
            k += 1;
            continue;
        }
        let attr_name = fold_name(&input[attr_start..k], config);

        skip_whitespace(&mut k);
        let value = if k < len && bytes[k] == b'=' {
            k += 1;
            skip_whitespace(&mut k);
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                k += 1;
                let vstart = k;
                match memchr(quote, &bytes[k..]) {
                    Some(rel) => {
                        k += rel;
                        let raw = &input[vstart..k];
                        k += 1;
                        raw.to_string()
                    }
                    None => {
                        // unclosed quote: the value stops at the next `>`
                        k += memchr(b'>', &bytes[k..])?;
                        input[vstart..k].to_string()
                    }
                }
            } else {
                let vstart = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    if bytes[k] == b'/' && k + 1 < len && bytes[k + 1] == b'>' {
                        break;
                    }
                    k += 1;
                }
                input[vstart..k].to_string()
            }
        } else {
            String::new()
        };
        attributes.push((attr_name, value));
    }

    Some(StartTag {
        name,
        attributes,
        self_closing,
        end: k,
    })
}

/// Tokenizes one chunk of markup. Positions in the returned tokens are byte offsets into
/// `input`.
pub fn tokenize(input: &str, config: &ParserConfig) -> Vec<Token> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let len = bytes.len();
    // start of the pending text run
    let mut text_start = 0;
    // no tag, end tag or declaration can finish past this byte
    let last_gt = memrchr(b'>', bytes);
    let mut i = 0;
    // Invariant: every slice endpoint is at an ASCII structural byte, hence a char boundary.
    while i < len {
        let Some(rel) = memchr(b'<', &bytes[i..]) else {
            break;
        };
        i += rel;
        debug_assert!(input.is_char_boundary(i));
        let next = bytes.get(i + 1).copied();

        if input[i..].starts_with(COMMENT_START) {
            push_text(&mut out, &input[text_start..i]);
            let body_start = i + COMMENT_START.len();
            let rest = &input[body_start..];
            let (body, end) = if rest.starts_with('>') {
                ("", body_start + 1)
            } else if rest.starts_with("->") {
                ("", body_start + 2)
            } else {
                match rest.find(COMMENT_END) {
                    Some(rel_end) => (
                        &rest[..rel_end],
                        body_start + rel_end + COMMENT_END.len(),
                    ),
                    None => (rest, len),
                }
            };
            out.push(Token::Comment(body.trim().to_string()));
            i = end;
            text_start = end;
            continue;
        }

        if last_gt.is_none_or(|gt| gt < i) {
            break;
        }

        if next == Some(b'!') {
            let Some(rel_gt) = memchr(b'>', &bytes[i + 2..]) else {
                i += 1;
                continue;
            };
            push_text(&mut out, &input[text_start..i]);
            let gt = i + 2 + rel_gt;
            out.push(Token::Declaration(input[i + 2..gt].to_string()));
            i = gt + 1;
            text_start = i;
            continue;
        }

        if next == Some(b'/') && bytes.get(i + 2).is_some_and(u8::is_ascii_alphabetic) {
            let name_start = i + 2;
            let mut j = name_start;
            while j < len && is_tag_name_char(bytes[j]) {
                j += 1;
            }
            let Some(rel_gt) = memchr(b'>', &bytes[j..]) else {
                i += 1;
                continue;
            };
            push_text(&mut out, &input[text_start..i]);
            out.push(Token::EndTag {
                name: fold_name(&input[name_start..j], config),
                position: i,
            });
            i = j + rel_gt + 1;
            text_start = i;
            continue;
        }

        if next.is_some_and(|c| c.is_ascii_alphabetic()) {
            let Some(tag) = scan_start_tag(input, i, config) else {
                i += 1;
                continue;
            };
            push_text(&mut out, &input[text_start..i]);
            let content_start = tag.end;
            let is_rawtext = !tag.self_closing
                && config
                    .rawtext_elements
                    .iter()
                    .any(|raw| raw.eq_ignore_ascii_case(&tag.name));
            let name = tag.name.clone();
            out.push(Token::StartTag {
                name: tag.name,
                attributes: tag.attributes,
                self_closing: tag.self_closing,
                position: i,
            });

            if is_rawtext {
                let mut close_tag = Vec::with_capacity(name.len() + 2);
                close_tag.extend_from_slice(b"</");
                close_tag.extend_from_slice(name.as_bytes());
                match find_rawtext_close_tag(&input[content_start..], &close_tag) {
                    Some((rel_start, rel_end)) => {
                        push_text(&mut out, &input[content_start..content_start + rel_start]);
                        out.push(Token::EndTag {
                            name,
                            position: content_start + rel_start,
                        });
                        i = content_start + rel_end;
                        text_start = i;
                        continue;
                    }
                    None => {
                        // Unclosed rawtext: the rest of the input is its content.
                        push_text(&mut out, &input[content_start..]);
                        text_start = len;
                        break;
                    }
                }
            }

            i = content_start;
            text_start = i;
            continue;
        }

        // a lone `<` is ordinary text
        i += 1;
    }
    push_text(&mut out, &input[text_start..]);
    log::trace!(
        target: "markup.tokenizer",
        "tokenized {len} bytes into {} tokens",
        out.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(input: &str) -> Vec<Token> {
        tokenize(input, &ParserConfig::default())
    }

    fn start(name: &str, attributes: &[(&str, &str)], self_closing: bool, position: usize) -> Token {
        Token::StartTag {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            self_closing,
            position,
        }
    }

    fn end(name: &str, position: usize) -> Token {
        Token::EndTag {
            name: name.to_string(),
            position,
        }
    }

    #[test]
    fn tokenize_simple_document() {
        assert_eq!(
            toks("<html><body>foo</body></html>"),
            vec![
                start("html", &[], false, 0),
                start("body", &[], false, 6),
                Token::Text("foo".to_string()),
                end("body", 15),
                end("html", 22),
            ]
        );
    }

    #[test]
    fn tokenize_preserves_utf8_text_nodes() {
        let stream = toks("<p>120×32</p> ¡Hola 😊");
        assert!(
            stream.iter().any(|t| matches!(t, Token::Text(s) if s == "120×32")),
            "expected UTF-8 text token, got: {stream:?}"
        );
        assert_eq!(stream.last(), Some(&Token::Text(" ¡Hola 😊".to_string())));
    }

    #[test]
    fn tokenize_keeps_declaration_case() {
        assert_eq!(
            toks("<!DOCTYPE html>"),
            vec![Token::Declaration("DOCTYPE html".to_string())]
        );
        assert_eq!(
            toks("<!DoCtYpE html>"),
            vec![Token::Declaration("DoCtYpE html".to_string())]
        );
        // kept verbatim so `<! --x>` cannot print back as a comment
        assert_eq!(toks("<! --x>"), vec![Token::Declaration(" --x".to_string())]);
    }

    #[test]
    fn tokenize_trims_comment_bodies() {
        assert_eq!(
            toks("<!--  nav  --><p>"),
            vec![Token::Comment("nav".to_string()), start("p", &[], false, 14)]
        );
    }

    #[test]
    fn tokenize_unterminated_comment_runs_to_end() {
        assert_eq!(
            toks("a<!-- never closed"),
            vec![
                Token::Text("a".to_string()),
                Token::Comment("never closed".to_string())
            ]
        );
    }

    #[test]
    fn tokenize_abrupt_empty_comments() {
        for comment in ["<!-->", "<!--->"] {
            let input = format!("<p>a</p>{comment}<div>b</div>");
            let after = 8 + comment.len();
            assert_eq!(
                toks(&input),
                vec![
                    start("p", &[], false, 0),
                    Token::Text("a".to_string()),
                    end("p", 4),
                    Token::Comment(String::new()),
                    start("div", &[], false, after),
                    Token::Text("b".to_string()),
                    end("div", after + 6),
                ],
                "{comment}"
            );
        }
        assert_eq!(toks("<!---->"), vec![Token::Comment(String::new())]);
    }

    #[test]
    fn tokenize_accepts_mixed_attribute_syntax() {
        let stream = toks(r#"<a href="/x" title='t' data-n=3 hidden>"#);
        assert_eq!(
            stream,
            vec![start(
                "a",
                &[("href", "/x"), ("title", "t"), ("data-n", "3"), ("hidden", "")],
                false,
                0
            )]
        );
    }

    #[test]
    fn tokenize_quoted_value_may_contain_angle_brackets() {
        let stream = toks(r#"<p title="a > b">x</p>"#);
        assert_eq!(stream[0], start("p", &[("title", "a > b")], false, 0));
        assert_eq!(stream[1], Token::Text("x".to_string()));
    }

    #[test]
    fn tokenize_does_not_decode_character_references() {
        let stream = toks(r#"<p title="&amp;">&lt;b&gt;</p>"#);
        assert_eq!(stream[0], start("p", &[("title", "&amp;")], false, 0));
        assert_eq!(stream[1], Token::Text("&lt;b&gt;".to_string()));
    }

    #[test]
    fn tokenize_self_closing_marker() {
        assert_eq!(
            toks(r#"<img src="a.png" /><br/>"#),
            vec![
                start("img", &[("src", "a.png")], true, 0),
                start("br", &[], true, 19),
            ]
        );
    }

    #[test]
    fn tokenize_has_no_void_element_table() {
        assert_eq!(toks("<br>"), vec![start("br", &[], false, 0)]);
    }

    #[test]
    fn tokenize_lone_angle_brackets_are_text() {
        assert_eq!(
            toks("1 < 2 <3 </ >"),
            vec![Token::Text("1 < 2 <3 </ >".to_string())]
        );
    }

    #[test]
    fn tokenize_unterminated_start_tag_is_text() {
        assert_eq!(
            toks(r#"x<div class="a"#),
            vec![Token::Text(r#"x<div class="a"#.to_string())]
        );
    }

    #[test]
    fn tokenize_unclosed_quote_runs_to_next_angle_bracket() {
        assert_eq!(
            toks(r#"<a t="x><b c='y'>"#),
            vec![
                start("a", &[("t", "x")], false, 0),
                start("b", &[("c", "y")], false, 8),
            ]
        );
    }

    #[test]
    fn tokenize_unterminated_tags_scan_linearly() {
        for unit in ["<a", "</a", "<!a", "<a b='"] {
            let input = unit.repeat(20_000);
            assert_eq!(toks(&input), vec![Token::Text(input.clone())], "{unit}");
        }
        let input = format!("<p>{}", "<a".repeat(20_000));
        assert_eq!(toks(&input)[0], start("p", &[], false, 0));
        assert_eq!(toks(&input).len(), 2);
    }

    #[test]
    fn tokenize_lowercases_names_by_default() {
        assert_eq!(
            toks("<DiV ID=one></DIV>"),
            vec![start("div", &[("id", "one")], false, 0), end("div", 12)]
        );
    }

    #[test]
    fn tokenize_can_keep_name_case() {
        let config = ParserConfig {
            lowercase_names: false,
            ..ParserConfig::default()
        };
        assert_eq!(
            tokenize("<Svg viewBox='0'></Svg>", &config),
            vec![start("Svg", &[("viewBox", "0")], false, 0), end("Svg", 17)]
        );
    }

    #[test]
    fn tokenize_allows_custom_element_and_namespaced_tags() {
        let names: Vec<String> = toks("<my-component></my-component><svg:rect></svg:rect>")
            .into_iter()
            .filter_map(|t| match t {
                Token::StartTag { name, .. } | Token::EndTag { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(
            names,
            ["my-component", "my-component", "svg:rect", "svg:rect"]
        );
    }

    #[test]
    fn tokenize_finds_script_end_tag_case_insensitive() {
        assert_eq!(
            toks("<script>if (a < b) {}</ScRiPt >"),
            vec![
                start("script", &[], false, 0),
                Token::Text("if (a < b) {}".to_string()),
                end("script", 21),
            ]
        );
    }

    #[test]
    fn rawtext_close_tag_does_not_accept_near_matches() {
        assert_eq!(
            toks("<style>ok</stylex >no</style>"),
            vec![
                start("style", &[], false, 0),
                Token::Text("ok</stylex >no".to_string()),
                end("style", 21),
            ]
        );
    }

    #[test]
    fn tokenize_handles_rawtext_without_close_tag() {
        assert_eq!(
            toks("<script>x<y>"),
            vec![start("script", &[], false, 0), Token::Text("x<y>".to_string())]
        );
    }

    #[test]
    fn tokenize_handles_many_simple_tags_linearly() {
        let input = "<a></a>".repeat(20_000);
        assert_eq!(toks(&input).len(), 40_000);
    }

    #[test]
    fn tokenize_handles_tons_of_angle_brackets() {
        let input = "<".repeat(200_000);
        let stream = toks(&input);
        assert_eq!(stream, vec![Token::Text(input)]);
    }
}
