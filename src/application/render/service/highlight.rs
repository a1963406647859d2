use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use syntect::{
    highlighting::Theme,
    html::highlighted_html_for_string,
    parsing::{SyntaxReference, SyntaxSet},
};

use crate::application::render::types::RenderError;

/// Replace every fenced or indented code block under `root` with highlighted
/// HTML. Returns whether any block was found.
pub(crate) fn highlight_blocks<'a>(
    root: &'a AstNode<'a>,
    syntax_set: &SyntaxSet,
    theme: &Theme,
) -> Result<bool, RenderError> {
    let mut found = false;
    visit(root, syntax_set, theme, &mut found)?;
    Ok(found)
}

fn visit<'a>(
    node: &'a AstNode<'a>,
    syntax_set: &SyntaxSet,
    theme: &Theme,
    found: &mut bool,
) -> Result<(), RenderError> {
    if let Some((info, literal)) = extract_code_block(node) {
        let language = info.split_whitespace().next();
        let html = highlight_code(language, &literal, syntax_set, theme)?;
        node.data.borrow_mut().value = NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal: html,
        });
        *found = true;
        return Ok(());
    }

    let mut child = node.first_child();
    while let Some(next) = child {
        visit(next, syntax_set, theme, found)?;
        child = next.next_sibling();
    }
    Ok(())
}

pub(crate) fn highlight_code(
    language: Option<&str>,
    code: &str,
    syntax_set: &SyntaxSet,
    theme: &Theme,
) -> Result<String, RenderError> {
    let lang_token = language.unwrap_or("text");
    let syntax =
        find_syntax(syntax_set, lang_token).unwrap_or_else(|| syntax_set.find_syntax_plain_text());

    let mut source = code.to_string();
    if !source.ends_with('\n') {
        source.push('\n');
    }

    let highlighted = highlighted_html_for_string(&source, syntax_set, syntax, theme).map_err(
        |err| RenderError::Highlighting {
            language: lang_token.to_string(),
            message: err.to_string(),
        },
    )?;

    let lang_attr = ammonia::clean_text(&lang_token.to_ascii_lowercase());
    Ok(format!(
        "<div class=\"highlight\" data-language=\"{lang_attr}\">{highlighted}</div>\n"
    ))
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        Some((block.info.trim().to_string(), block.literal.clone()))
    } else {
        None
    }
}
