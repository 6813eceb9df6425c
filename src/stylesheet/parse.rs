//! Strict cssparser front end for the stylesheet model.
//!
//! Any rule or declaration cssparser reports as invalid fails the whole
//! stylesheet; the caller leaves such stylesheets untouched.

use std::fmt;

use cssparser::{
    AtRuleParser, BasicParseErrorKind, CowRcStr, DeclarationParser, Delimiter, ParseError,
    ParseErrorKind, Parser, ParserInput, ParserState, QualifiedRuleParser, RuleBodyItemParser,
    RuleBodyParser, SourceLocation, StyleSheetParser, ToCss, Token, parse_one_rule,
};
use thiserror::Error;

use super::{
    CssRule, Declaration, DeclarationRule, MediaRule, NamespaceRule, StatementRule, StyleRule,
    Stylesheet, UnknownRule, collapse_whitespace,
};

/// A stylesheet that could not be parsed; reports the earliest problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct StylesheetError {
    /// 1-based.
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// An at-rule kept verbatim because its grammar is unknown to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRuleWarning {
    pub keyword: String,
    pub line: u32,
}

/// Parse output: the rule tree plus non-fatal findings.
#[derive(Debug, Clone, Default)]
pub struct ParsedStylesheet {
    pub sheet: Stylesheet,
    pub warnings: Vec<UnknownRuleWarning>,
}

/// Reasons we reject a rule that cssparser itself would accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum RuleError {
    #[error("empty selector")]
    EmptySelector,
    #[error("@{0} is not allowed here")]
    Misplaced(String),
    #[error("@{0} must not have a block")]
    UnexpectedBlock(String),
    #[error("@{0} requires a block")]
    MissingBlock(String),
    #[error("empty value for property '{0}'")]
    EmptyValue(String),
    #[error("declarations are not allowed at the top level")]
    StrayDeclaration,
}

impl StylesheetError {
    fn from_parse_error(err: &ParseError<'_, RuleError>) -> Self {
        let message = match &err.kind {
            ParseErrorKind::Custom(reason) => reason.to_string(),
            ParseErrorKind::Basic(basic) => describe_basic(basic),
        };
        Self::at(err.location, message)
    }

    fn at(location: SourceLocation, message: String) -> Self {
        Self {
            line: location.line + 1,
            column: location.column,
            message,
        }
    }
}

fn describe_basic(kind: &BasicParseErrorKind<'_>) -> String {
    match kind {
        BasicParseErrorKind::UnexpectedToken(token) => {
            format!("unexpected token '{}'", token.to_css_string())
        }
        BasicParseErrorKind::EndOfInput => "unexpected end of input".to_string(),
        BasicParseErrorKind::AtRuleInvalid(name) => format!("invalid @{name} rule"),
        BasicParseErrorKind::AtRuleBodyInvalid => "invalid at-rule body".to_string(),
        BasicParseErrorKind::QualifiedRuleInvalid => "invalid rule".to_string(),
    }
}

pub(super) fn parse_stylesheet(css: &str) -> Result<ParsedStylesheet, StylesheetError> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut rule_parser = RuleListParser {
        errors: &mut errors,
        warnings: &mut warnings,
        nested: false,
    };
    let rules = parse_rule_list(&mut parser, &mut rule_parser);

    if let Some(first) = errors.into_iter().min_by_key(|e| (e.line, e.column)) {
        return Err(first);
    }
    Ok(ParsedStylesheet {
        sheet: Stylesheet { rules },
        warnings,
    })
}

/// Parser for a list of rules: the stylesheet itself or a `@media` body.
struct RuleListParser<'a> {
    errors: &'a mut Vec<StylesheetError>,
    warnings: &'a mut Vec<UnknownRuleWarning>,
    nested: bool,
}

fn parse_rule_list(
    input: &mut Parser<'_, '_>,
    rule_parser: &mut RuleListParser<'_>,
) -> Vec<CssRule> {
    let mut rules = Vec::new();
    let mut errors = Vec::new();

    let mut list = StyleSheetParser::new(input, rule_parser);
    loop {
        take_leading_items(list.input, list.parser, &mut rules, &mut errors);
        let Some(result) = list.next() else {
            break;
        };
        match result {
            Ok(rule) => rules.push(rule),
            Err((err, _)) => errors.push(StylesheetError::from_parse_error(&err)),
        }
    }

    list.parser.errors.extend(errors);
    rules
}

/// Consume the comments and `@charset` rules ahead of the next rule.
///
/// StyleSheetParser skips comments and drops a leading `@charset` without
/// looking at it, so both are handled here.
fn take_leading_items<'i>(
    input: &mut Parser<'i, '_>,
    rule_parser: &mut RuleListParser<'_>,
    rules: &mut Vec<CssRule>,
    errors: &mut Vec<StylesheetError>,
) {
    loop {
        let start = input.state();
        let charset = match input.next_including_whitespace_and_comments() {
            Ok(Token::WhiteSpace(_)) => continue,
            Ok(Token::Comment(text)) => {
                rules.push(CssRule::Comment(format!("/*{text}*/")));
                continue;
            }
            Ok(Token::AtKeyword(name)) => name.eq_ignore_ascii_case("charset"),
            _ => false,
        };
        input.reset(&start);
        if !charset {
            return;
        }
        let parsed =
            input.parse_until_after(Delimiter::Semicolon, |i| parse_one_rule(i, &mut *rule_parser));
        match parsed {
            Ok(rule) => rules.push(rule),
            Err(err) => errors.push(StylesheetError::from_parse_error(&err)),
        }
    }
}

enum AtPrelude {
    Media(String),
    Namespace(NamespaceRule),
    Statement { keyword: String, prelude: String },
    Declarations { keyword: String, prelude: String },
    Unknown { keyword: String, prelude: String, line: u32 },
}

impl<'i> AtRuleParser<'i> for RuleListParser<'_> {
    type Prelude = AtPrelude;
    type AtRule = CssRule;
    type Error = RuleError;

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let keyword = name.to_ascii_lowercase();
        match keyword.as_str() {
            "namespace" | "charset" | "import" if self.nested => {
                Err(input.new_custom_error(RuleError::Misplaced(keyword)))
            }
            "media" => Ok(AtPrelude::Media(normalized_prelude(input))),
            "namespace" => parse_namespace_prelude(input).map(AtPrelude::Namespace),
            "charset" | "import" => Ok(AtPrelude::Statement {
                keyword,
                prelude: normalized_prelude(input),
            }),
            "font-face" | "page" => Ok(AtPrelude::Declarations {
                keyword,
                prelude: normalized_prelude(input),
            }),
            _ => {
                let line = input.current_source_location().line + 1;
                Ok(AtPrelude::Unknown {
                    keyword: name.to_string(),
                    prelude: consume_raw(input).trim().to_string(),
                    line,
                })
            }
        }
    }

    fn rule_without_block(
        &mut self,
        prelude: Self::Prelude,
        start: &ParserState,
    ) -> Result<Self::AtRule, ()> {
        match prelude {
            AtPrelude::Namespace(rule) => Ok(CssRule::Namespace(rule)),
            AtPrelude::Statement { keyword, prelude } => {
                Ok(CssRule::Statement(StatementRule { keyword, prelude }))
            }
            AtPrelude::Unknown {
                keyword,
                prelude,
                line,
            } => {
                let text = format!("@{}{};", keyword, spaced(&prelude));
                Ok(self.unknown(keyword, text, line))
            }
            AtPrelude::Media(_) => {
                self.missing_block(start, "media");
                Err(())
            }
            AtPrelude::Declarations { keyword, .. } => {
                self.missing_block(start, &keyword);
                Err(())
            }
        }
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        match prelude {
            AtPrelude::Media(media) => {
                let mut nested = RuleListParser {
                    errors: &mut *self.errors,
                    warnings: &mut *self.warnings,
                    nested: true,
                };
                let rules = parse_rule_list(input, &mut nested);
                Ok(CssRule::Media(MediaRule { media, rules }))
            }
            AtPrelude::Declarations { keyword, prelude } => {
                let declarations = parse_declarations(input, self.errors);
                Ok(CssRule::Declarations(DeclarationRule {
                    keyword,
                    prelude,
                    declarations,
                }))
            }
            AtPrelude::Unknown {
                keyword,
                prelude,
                line,
            } => {
                let body = consume_raw(input);
                let text = format!("@{}{} {{{}}}", keyword, spaced(&prelude), body);
                Ok(self.unknown(keyword, text, line))
            }
            AtPrelude::Namespace(_) => Err(input.new_custom_error(RuleError::UnexpectedBlock(
                "namespace".to_string(),
            ))),
            AtPrelude::Statement { keyword, .. } => {
                Err(input.new_custom_error(RuleError::UnexpectedBlock(keyword)))
            }
        }
    }
}

impl RuleListParser<'_> {
    fn unknown(&mut self, keyword: String, text: String, line: u32) -> CssRule {
        self.warnings.push(UnknownRuleWarning {
            keyword: format!("@{keyword}"),
            line,
        });
        CssRule::Unknown(UnknownRule {
            keyword,
            text,
            line,
        })
    }

    // rule_without_block can only signal failure with (), so record the
    // reason here
    fn missing_block(&mut self, start: &ParserState, keyword: &str) {
        self.errors.push(StylesheetError::at(
            start.source_location(),
            RuleError::MissingBlock(keyword.to_string()).to_string(),
        ));
    }
}

impl<'i> QualifiedRuleParser<'i> for RuleListParser<'_> {
    type Prelude = Vec<String>;
    type QualifiedRule = CssRule;
    type Error = RuleError;

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        parse_selector_list(input)
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let declarations = parse_declarations(input, self.errors);
        Ok(CssRule::Style(StyleRule {
            selectors: prelude,
            declarations,
        }))
    }
}

fn parse_namespace_prelude<'i>(
    input: &mut Parser<'i, '_>,
) -> Result<NamespaceRule, ParseError<'i, RuleError>> {
    let prefix = input
        .try_parse(|i| i.expect_ident_cloned())
        .map(|prefix| prefix.to_string())
        .unwrap_or_default();
    let uri = input.expect_url_or_string()?.to_string();
    input.expect_exhausted()?;
    Ok(NamespaceRule { prefix, uri })
}

/// Consume the rest of the input and return its source text.
fn consume_raw<'i>(input: &mut Parser<'i, '_>) -> &'i str {
    let start = input.position();
    while input.next_including_whitespace_and_comments().is_ok() {}
    input.slice_from(start)
}

fn normalized_prelude(input: &mut Parser<'_, '_>) -> String {
    collapse_whitespace(consume_raw(input))
}

fn spaced(prelude: &str) -> String {
    if prelude.is_empty() {
        String::new()
    } else {
        format!(" {prelude}")
    }
}

// =============================================================================
// Selector text normalization
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Selector,
    Function,
    Bracket,
}

/// One selector's text being rebuilt token by token.
#[derive(Default)]
struct SelectorText {
    out: String,
    pending_space: bool,
}

impl SelectorText {
    fn push(&mut self, text: &str, context: Context) {
        if std::mem::take(&mut self.pending_space) && self.wants_space(text, context) {
            self.out.push(' ');
        }
        self.out.push_str(text);
    }

    fn wants_space(&self, next: &str, context: Context) -> bool {
        let Some(last) = self.out.chars().last() else {
            return false;
        };
        if matches!(last, ' ' | '(' | '[') {
            return false;
        }
        match context {
            // Only the case-sensitivity flag keeps its separating space
            Context::Bracket => {
                !matches!(last, '=' | '|') && next.starts_with(|c: char| c.is_alphabetic())
            }
            _ => true,
        }
    }

    fn combinator(&mut self, c: char) {
        self.pending_space = false;
        self.trim_end();
        if !self.out.is_empty() && !self.out.ends_with('(') {
            self.out.push(' ');
        }
        self.out.push(c);
        self.out.push(' ');
    }

    fn comma(&mut self) {
        self.pending_space = false;
        self.trim_end();
        self.out.push_str(", ");
    }

    fn close(&mut self, c: char) {
        self.pending_space = false;
        self.trim_end();
        self.out.push(c);
    }

    fn trim_end(&mut self) {
        let len = self.out.trim_end().len();
        self.out.truncate(len);
    }

    fn finish<'i>(&mut self, location: SourceLocation) -> Result<String, ParseError<'i, RuleError>> {
        self.pending_space = false;
        let text = std::mem::take(&mut self.out);
        let text = text.trim();
        if text.is_empty() {
            Err(location.new_custom_error(RuleError::EmptySelector))
        } else {
            Ok(text.to_string())
        }
    }
}

/// Split a rule prelude into normalized selector texts.
///
/// Whitespace collapses to single spaces, combinators get one space on each
/// side, and tokens are re-serialized in their canonical form.
fn parse_selector_list<'i>(input: &mut Parser<'i, '_>) -> Result<Vec<String>, ParseError<'i, RuleError>> {
    let mut selectors = Vec::new();
    let mut text = SelectorText::default();

    loop {
        let location = input.current_source_location();
        let token = match input.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        if token == Token::Comma {
            selectors.push(text.finish(location)?);
            continue;
        }
        write_token(input, &mut text, token, Context::Selector)?;
    }

    let location = input.current_source_location();
    selectors.push(text.finish(location)?);
    Ok(selectors)
}

fn write_nested<'i>(
    input: &mut Parser<'i, '_>,
    text: &mut SelectorText,
    context: Context,
) -> Result<(), ParseError<'i, RuleError>> {
    while let Ok(token) = input.next_including_whitespace() {
        let token = token.clone();
        write_token(input, text, token, context)?;
    }
    Ok(())
}

fn write_token<'i>(
    input: &mut Parser<'i, '_>,
    text: &mut SelectorText,
    token: Token<'i>,
    context: Context,
) -> Result<(), ParseError<'i, RuleError>> {
    match token {
        Token::WhiteSpace(_) => text.pending_space = true,
        Token::Delim(c @ ('>' | '+' | '~')) if context != Context::Bracket => text.combinator(c),
        Token::Comma => text.comma(),
        Token::Function(_) | Token::ParenthesisBlock => {
            text.push(&token.to_css_string(), context);
            input.parse_nested_block(|nested| write_nested(nested, text, Context::Function))?;
            text.close(')');
        }
        Token::SquareBracketBlock => {
            text.push("[", context);
            input.parse_nested_block(|nested| write_nested(nested, text, Context::Bracket))?;
            text.close(']');
        }
        Token::CurlyBracketBlock => {
            return Err(input.new_unexpected_token_error(token));
        }
        other => text.push(&other.to_css_string(), context),
    }
    Ok(())
}

// =============================================================================
// Declarations
// =============================================================================

fn parse_declarations(input: &mut Parser<'_, '_>, errors: &mut Vec<StylesheetError>) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    let mut parser = DeclarationListParser;

    for result in RuleBodyParser::new(input, &mut parser) {
        match result {
            Ok(declaration) => declarations.push(declaration),
            Err((err, _)) => errors.push(StylesheetError::from_parse_error(&err)),
        }
    }

    declarations
}

struct DeclarationListParser;

impl<'i> AtRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = RuleError;

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(RuleError::Misplaced(name.to_string())))
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid))
    }
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = RuleError;

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(RuleError::StrayDeclaration))
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }
}

impl<'i> DeclarationParser<'i> for DeclarationListParser {
    type Declaration = Declaration;
    type Error = RuleError;

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let start = input.position();
        let mut end = start;
        let mut important = false;

        loop {
            let token = match input.next() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };
            match token {
                Token::Delim('!') => {
                    input.expect_ident_matching("important")?;
                    input.expect_exhausted()?;
                    important = true;
                    break;
                }
                Token::Function(_)
                | Token::ParenthesisBlock
                | Token::SquareBracketBlock
                | Token::CurlyBracketBlock => {
                    input.parse_nested_block(|nested| {
                        while nested.next().is_ok() {}
                        Ok::<(), ParseError<'i, RuleError>>(())
                    })?;
                }
                _ => {}
            }
            end = input.position();
        }

        let value = collapse_whitespace(input.slice(start..end));
        if value.is_empty() {
            return Err(input.new_custom_error(RuleError::EmptyValue(name.to_string())));
        }
        Ok(Declaration {
            name: name.to_string(),
            value,
            important,
        })
    }
}

impl<'i> RuleBodyItemParser<'i, Declaration, RuleError> for DeclarationListParser {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

impl fmt::Display for UnknownRuleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}", self.keyword, self.line)
    }
}
