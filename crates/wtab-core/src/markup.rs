//! Cell content tokenizer
//!
//! Splits serialized cell markup into the flat token list stored with every
//! cell: each character outside a tag is one token, each `<...>` tag is one
//! token. Comments and other `<!...>` declarations are dropped.

/// Tokenize serialized markup into characters and whole tags.
///
/// A `<` always starts a new tag, discarding an unterminated one; a `>` seen
/// outside a tag is an ordinary character.
///
/// ```
/// use wtab_core::markup::tokenize_markup;
///
/// assert_eq!(
///     tokenize_markup("a<b>c</b>"),
///     vec!["a", "<b>", "c", "</b>"]
/// );
/// ```
#[must_use]
pub fn tokenize_markup(markup: &str) -> Vec<String> {
    let mut tokens = Vec::with_capacity(markup.len());
    let mut tag_start: Option<usize> = None;

    for (i, ch) in markup.char_indices() {
        match (ch, tag_start) {
            ('<', _) => tag_start = Some(i),
            ('>', Some(start)) => {
                let tag = &markup[start..=i];
                if !tag.starts_with("<!") {
                    tokens.push(tag.to_string());
                }
                tag_start = None;
            }
            (_, None) => tokens.push(ch.to_string()),
            _ => {}
        }
    }

    tokens
}
