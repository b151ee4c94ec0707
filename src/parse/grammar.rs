use winnow::ascii::{digit0, digit1, line_ending, till_line_ending};
use winnow::combinator::{alt, cut_err, eof, fail, opt, repeat, separated};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::Stream;
use winnow::token::{any, none_of, take_while};

use crate::{Alternative, ConstantValue, Modifier, Placeholder, RuleBody, RuleDefinition, Segment};

use super::error::GrammarSyntaxError;
use super::parser::RuleTable;

// -- Whitespace & comments --------------------------------------------------

/// Whitespace and `#` comment lines between top-level items.
fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

fn hspace(input: &mut &str) -> ModalResult<()> {
    take_while(0.., [' ', '\t']).void().parse_next(input)
}

/// Whitespace inside a rule body. Returns whether a line break was skipped.
fn body_ws(input: &mut &str) -> ModalResult<bool> {
    let skipped = take_while(0.., |c: char| c.is_whitespace()).parse_next(input)?;
    Ok(skipped.contains('\n'))
}

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

/// Fail here without backtracking.
fn reject<T>(input: &mut &str, what: &'static str) -> ModalResult<T> {
    cut_err(fail::<_, T, _>)
        .context(expected(what))
        .parse_next(input)
}

// -- Identifiers & literals -------------------------------------------------

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any)
            .context(StrContext::Expected(StrContextValue::CharLiteral('"')))
            .parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = cut_err(any).parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn char_literal(input: &mut &str) -> ModalResult<char> {
    '\''.parse_next(input)?;
    let c = match cut_err(any).parse_next(input)? {
        '\\' => match cut_err(any).parse_next(input)? {
            'n' => '\n',
            't' => '\t',
            other => other,
        },
        c => c,
    };
    cut_err('\'')
        .context(StrContext::Expected(StrContextValue::CharLiteral('\'')))
        .parse_next(input)?;
    Ok(c)
}

// -- Constants --------------------------------------------------------------

fn number(input: &mut &str) -> ModalResult<ConstantValue> {
    let text = (opt('-'), digit1, opt(('.', digit0)))
        .take()
        .parse_next(input)?;
    if text.contains('.') {
        Ok(ConstantValue::Float(text.to_owned()))
    } else {
        Ok(ConstantValue::Int(text.to_owned()))
    }
}

fn bool_or_ref(input: &mut &str) -> ModalResult<ConstantValue> {
    let word = ident.parse_next(input)?;
    Ok(match word {
        "true" => ConstantValue::Bool(true),
        "false" => ConstantValue::Bool(false),
        other => ConstantValue::Ref(other.to_owned()),
    })
}

/// Deepest `[...]` nesting accepted in a `define` value.
const MAX_LIST_NESTING: usize = 64;

fn list(input: &mut &str, depth: usize) -> ModalResult<ConstantValue> {
    '['.parse_next(input)?;
    if depth >= MAX_LIST_NESTING {
        return reject(input, "a list nested at most 64 levels deep");
    }
    let items: Vec<ConstantValue> = separated(
        0..,
        |i: &mut &str| constant_value(i, depth + 1),
        (ws, ','),
    )
    .parse_next(input)?;
    ws.parse_next(input)?;
    cut_err(']')
        .context(StrContext::Expected(StrContextValue::CharLiteral(']')))
        .parse_next(input)?;
    Ok(ConstantValue::List(items))
}

fn constant_value(input: &mut &str, depth: usize) -> ModalResult<ConstantValue> {
    ws.parse_next(input)?;
    alt((
        |i: &mut &str| list(i, depth),
        string_literal.map(ConstantValue::String),
        char_literal.map(ConstantValue::Char),
        number,
        bool_or_ref,
    ))
    .context(expected("constant value"))
    .parse_next(input)
}

/// `define NAME: VALUE;`, after the `define` keyword.
fn define_rest(input: &mut &str) -> ModalResult<RuleDefinition> {
    let name = ident.context(expected("constant name")).parse_next(input)?;
    hspace.parse_next(input)?;
    ':'.context(StrContext::Expected(StrContextValue::CharLiteral(':')))
        .parse_next(input)?;
    let value = constant_value(input, 0)?;
    ws.parse_next(input)?;
    ';'.context(StrContext::Expected(StrContextValue::CharLiteral(';')))
        .parse_next(input)?;
    Ok(RuleDefinition {
        name: name.to_owned(),
        body: RuleBody::Constant(value),
    })
}

// -- Placeholders -----------------------------------------------------------

fn separator(input: &mut &str) -> ModalResult<String> {
    if input.starts_with('"') {
        return string_literal.parse_next(input);
    }
    let raw = take_while(1.., |c: char| c != ']' && c != '\n').parse_next(input)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return reject(input, "separator");
    }
    Ok(trimmed.to_owned())
}

fn modifier(input: &mut &str) -> ModalResult<Modifier> {
    let checkpoint = input.checkpoint();
    hspace.parse_next(input)?;
    if let Some(op) = opt(alt(("**", "++"))).parse_next(input)? {
        hspace.parse_next(input)?;
        let separator = cut_err(separator)
            .context(expected("separator"))
            .parse_next(input)?;
        hspace.parse_next(input)?;
        cut_err(']')
            .context(StrContext::Expected(StrContextValue::CharLiteral(']')))
            .parse_next(input)?;
        return Ok(Modifier::OneOrMoreSeparated {
            separator,
            allow_empty: op == "**",
        });
    }
    input.reset(&checkpoint);
    let modifier = opt(alt((
        '?'.value(Modifier::Optional),
        '*'.value(Modifier::ZeroOrMore),
        '+'.value(Modifier::OneOrMore),
    )))
    .parse_next(input)?;
    Ok(modifier.unwrap_or_default())
}

fn is_symbol_char(c: char) -> bool {
    "-+*/=><\\_.:,;!$%&?@".contains(c)
}

fn regex_body<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    repeat::<_, _, (), _, _>(
        1..,
        alt((('\\', none_of('\n')).void(), none_of(['/', '\\', '\n']).void())),
    )
    .take()
    .parse_next(input)
}

/// An inline target, kept as written: `s/regex/`, `kw[word]` or `sym[chars]`.
fn inline_target<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    alt((
        (
            "s/",
            cut_err(regex_body).context(expected("regex")),
            cut_err('/').context(StrContext::Expected(StrContextValue::CharLiteral('/'))),
        )
            .take(),
        (
            "kw[",
            hspace,
            cut_err(ident).context(expected("keyword")),
            hspace,
            cut_err(']').context(StrContext::Expected(StrContextValue::CharLiteral(']'))),
        )
            .take(),
        (
            "sym[",
            cut_err(take_while(1.., is_symbol_char)).context(expected("symbol characters")),
            cut_err(']').context(StrContext::Expected(StrContextValue::CharLiteral(']'))),
        )
            .take(),
    ))
    .parse_next(input)
}

/// `<name:Type>` or `<Type>`, with an optional modifier. `Type` may also be
/// an inline target.
fn placeholder(input: &mut &str) -> ModalResult<Placeholder> {
    '<'.parse_next(input)?;
    hspace.parse_next(input)?;
    let (name, target) = if let Some(target) = opt(inline_target).parse_next(input)? {
        (None, target.to_owned())
    } else {
        let first = cut_err(ident)
            .context(StrContext::Label("placeholder"))
            .context(expected("placeholder name or type"))
            .parse_next(input)?;
        hspace.parse_next(input)?;
        if opt(':').parse_next(input)?.is_some() {
            hspace.parse_next(input)?;
            let target = cut_err(alt((inline_target, ident)))
                .context(StrContext::Label("placeholder"))
                .context(expected("placeholder type"))
                .parse_next(input)?;
            (Some(first.to_owned()), target.to_owned())
        } else {
            (None, first.to_owned())
        }
    };
    hspace.parse_next(input)?;
    cut_err('>')
        .context(StrContext::Label("placeholder"))
        .context(StrContext::Expected(StrContextValue::CharLiteral('>')))
        .parse_next(input)?;
    let modifier = modifier.parse_next(input)?;
    Ok(Placeholder {
        name,
        target,
        modifier,
    })
}

// -- Rule bodies ------------------------------------------------------------

struct Token {
    segment: Segment,
    /// A bare `;`, which ends an alternative when it is the last token.
    terminator: bool,
}

impl Token {
    fn literal(text: String) -> Self {
        Self {
            segment: Segment::Literal(text),
            terminator: false,
        }
    }
}

fn body_token(input: &mut &str) -> ModalResult<Token> {
    if input.starts_with('"') {
        return string_literal.map(Token::literal).parse_next(input);
    }
    if input.starts_with('<') {
        let p = placeholder.parse_next(input)?;
        return Ok(Token {
            segment: Segment::Placeholder(p),
            terminator: false,
        });
    }
    if let Some(word) = opt(take_while(1.., is_word_char)).parse_next(input)? {
        return Ok(Token::literal(word.to_owned()));
    }
    let c = any.parse_next(input)?;
    Ok(Token {
        segment: Segment::Literal(c.to_string()),
        terminator: c == ';',
    })
}

fn finish_alternative(input: &mut &str, mut tokens: Vec<Token>) -> ModalResult<Alternative> {
    if tokens.last().is_some_and(|t| t.terminator) {
        tokens.pop();
    }
    if tokens.is_empty() {
        return reject(input, "at least one token before `|` or `~~~`");
    }
    Ok(Alternative {
        segments: tokens.into_iter().map(|t| t.segment).collect(),
    })
}

fn rule_body(input: &mut &str) -> ModalResult<Vec<Alternative>> {
    let mut alternatives = Vec::new();
    let mut tokens = Vec::new();
    let mut at_line_start = false;
    loop {
        at_line_start |= body_ws(input)?;
        if input.starts_with("~~~") {
            if !at_line_start {
                return reject(input, "`~~~` on its own line");
            }
            alternatives.push(finish_alternative(input, std::mem::take(&mut tokens))?);
            "~~~".parse_next(input)?;
            hspace.parse_next(input)?;
            cut_err(alt((line_ending.void(), eof.void())))
                .context(expected("end of line after `~~~`"))
                .parse_next(input)?;
            return Ok(alternatives);
        }
        if input.is_empty() {
            return reject(input, "`~~~` closing the rule");
        }
        if input.starts_with('|') {
            alternatives.push(finish_alternative(input, std::mem::take(&mut tokens))?);
            '|'.parse_next(input)?;
        } else {
            tokens.push(body_token(input)?);
        }
        at_line_start = false;
    }
}

// -- Top-level items --------------------------------------------------------

fn item(input: &mut &str) -> ModalResult<RuleDefinition> {
    let name = ident
        .context(expected("rule or define"))
        .parse_next(input)?;
    hspace.parse_next(input)?;
    if name == "define" && !input.starts_with(':') {
        return cut_err(define_rest).parse_next(input);
    }
    cut_err(':')
        .context(StrContext::Expected(StrContextValue::CharLiteral(':')))
        .parse_next(input)?;
    let alternatives = rule_body(input)?;
    Ok(RuleDefinition {
        name: name.to_owned(),
        body: RuleBody::Alternatives(alternatives),
    })
}

fn syntax_error(source: &str, rest: &str, err: ErrMode<ContextError>) -> GrammarSyntaxError {
    let message = match err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e.to_string().replace('\n', "; "),
        ErrMode::Incomplete(_) => String::new(),
    };
    let message = if message.is_empty() {
        "unexpected input".to_owned()
    } else {
        message
    };
    GrammarSyntaxError::at(source, source.len() - rest.len(), message)
}

/// Parse grammar source into a [`RuleTable`], stopping at the first error.
pub fn parse_grammar(source: &str) -> Result<RuleTable, GrammarSyntaxError> {
    let mut input = source;
    let mut table = RuleTable::new();
    loop {
        ws.parse_next(&mut input)
            .map_err(|e| syntax_error(source, input, e))?;
        if input.is_empty() {
            return Ok(table);
        }
        let start = source.len() - input.len();
        let rule = item
            .parse_next(&mut input)
            .map_err(|e| syntax_error(source, input, e))?;
        if let Err(dup) = table.insert(rule) {
            return Err(GrammarSyntaxError::at(
                source,
                start,
                format!("duplicate rule name '{}'", dup.name),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parse::parse;

    use super::*;

    fn alts(table: &RuleTable, name: &str) -> Vec<Alternative> {
        table.get(name).unwrap().alternatives().to_vec()
    }

    fn lit(text: &str) -> Segment {
        Segment::Literal(text.into())
    }

    fn slot(name: Option<&str>, target: &str, modifier: Modifier) -> Segment {
        Segment::Placeholder(Placeholder {
            name: name.map(str::to_owned),
            target: target.into(),
            modifier,
        })
    }

    #[test]
    fn parse_single_rule() {
        let table = parse("Greeting: \"Hello, \" <name:ident> \"!\";\n~~~\n").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            alts(&table, "Greeting")[0].segments,
            vec![
                lit("Hello, "),
                slot(Some("name"), "ident", Modifier::Once),
                lit("!"),
            ]
        );
    }

    #[test]
    fn parse_alternatives_in_order() {
        let src = "Expr:\n    <lhs:Expr> <op:ident> <rhs:Expr>\n  | <value:int>\n~~~";
        let table = parse(src).unwrap();
        let alts = alts(&table, "Expr");
        assert_eq!(alts.len(), 2);
        assert_eq!(alts[0].segments.len(), 3);
        assert_eq!(
            alts[1].segments,
            vec![slot(Some("value"), "int", Modifier::Once)]
        );
    }

    #[test]
    fn parse_separated_quoted() {
        let table = parse("List: \"[\" <items:ident> ** \",\" ] \"]\";\n~~~").unwrap();
        assert_eq!(
            alts(&table, "List")[0].segments[1],
            slot(
                Some("items"),
                "ident",
                Modifier::OneOrMoreSeparated {
                    separator: ",".into(),
                    allow_empty: true,
                }
            )
        );
    }

    #[test]
    fn parse_separated_bare_and_strict() {
        let table = parse("L: <xs:int> ++ ; ]\n~~~").unwrap();
        assert_eq!(
            alts(&table, "L")[0].segments[0],
            slot(
                Some("xs"),
                "int",
                Modifier::OneOrMoreSeparated {
                    separator: ";".into(),
                    allow_empty: false,
                }
            )
        );
    }

    #[test]
    fn parse_attached_modifiers() {
        let table = parse("R: <a:ident>? <b:ident>* <c:ident>+ <Body>\n~~~").unwrap();
        let segments = &alts(&table, "R")[0].segments;
        assert_eq!(segments[0], slot(Some("a"), "ident", Modifier::Optional));
        assert_eq!(segments[1], slot(Some("b"), "ident", Modifier::ZeroOrMore));
        assert_eq!(segments[2], slot(Some("c"), "ident", Modifier::OneOrMore));
        assert_eq!(segments[3], slot(None, "Body", Modifier::Once));
    }

    #[test]
    fn parse_inline_targets() {
        let table = parse("R: <kw[return]> <v:s/[a-z]+\\/x/>* <op:sym[+-]> <kw[ if ]>\n~~~").unwrap();
        assert_eq!(
            alts(&table, "R")[0].segments,
            vec![
                slot(None, "kw[return]", Modifier::Once),
                slot(Some("v"), r"s/[a-z]+\/x/", Modifier::ZeroOrMore),
                slot(Some("op"), "sym[+-]", Modifier::Once),
                slot(None, "kw[ if ]", Modifier::Once),
            ]
        );
    }

    #[test]
    fn names_starting_like_inline_targets() {
        let table = parse("R: <s:int> <kw> <sym:ident>\n~~~").unwrap();
        assert_eq!(
            alts(&table, "R")[0].segments,
            vec![
                slot(Some("s"), "int", Modifier::Once),
                slot(None, "kw", Modifier::Once),
                slot(Some("sym"), "ident", Modifier::Once),
            ]
        );
    }

    #[test]
    fn unterminated_inline_targets_are_errors() {
        let err = parse("R: <v:s/abc>\n~~~").unwrap_err();
        assert!(err.message.contains('/'), "{err}");
        let err = parse("R: <kw[if>\n~~~").unwrap_err();
        assert!(err.message.contains(']'), "{err}");
        let err = parse("R: <sym[ab]>\n~~~").unwrap_err();
        assert!(err.message.contains("symbol"), "{err}");
    }

    #[test]
    fn bare_words_and_symbols_are_literals() {
        let table = parse("Fn: fn <name:ident> ( ) ;\n~~~").unwrap();
        assert_eq!(
            alts(&table, "Fn")[0].segments,
            vec![
                lit("fn"),
                slot(Some("name"), "ident", Modifier::Once),
                lit("("),
                lit(")"),
            ]
        );
    }

    #[test]
    fn inner_semicolon_is_literal() {
        let table = parse("S: a ; b\n~~~").unwrap();
        assert_eq!(
            alts(&table, "S")[0].segments,
            vec![lit("a"), lit(";"), lit("b")]
        );
    }

    #[test]
    fn parse_defines() {
        let src = "define sep: \",\";\ndefine n: -3;\ndefine pi: 3.14;\ndefine c: 'x';\n\
                   define on: true;\ndefine all: [1, \"a\", other];\ndefine other: sep;";
        let table = parse(src).unwrap();
        let value = |name: &str| match &table.get(name).unwrap().body {
            RuleBody::Constant(v) => v.clone(),
            RuleBody::Alternatives(_) => panic!("{name} is not a constant"),
        };
        assert_eq!(value("sep"), ConstantValue::String(",".into()));
        assert_eq!(value("n"), ConstantValue::Int("-3".into()));
        assert_eq!(value("pi"), ConstantValue::Float("3.14".into()));
        assert_eq!(value("c"), ConstantValue::Char('x'));
        assert_eq!(value("on"), ConstantValue::Bool(true));
        assert_eq!(value("other"), ConstantValue::Ref("sep".into()));
        assert_eq!(
            value("all"),
            ConstantValue::List(vec![
                ConstantValue::Int("1".into()),
                ConstantValue::String("a".into()),
                ConstantValue::Ref("other".into()),
            ])
        );
    }

    #[test]
    fn rule_named_define() {
        let table = parse("define: x\n~~~").unwrap();
        assert!(!table.get("define").unwrap().is_constant());
    }

    #[test]
    fn comments_between_items() {
        let table = parse("# header\nA: a\n~~~\n# between\nB: b\n~~~\n").unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn string_escapes() {
        let table = parse("R: \"a\\\"b\\\\c\\n\"\n~~~").unwrap();
        assert_eq!(alts(&table, "R")[0].segments, vec![lit("a\"b\\c\n")]);
    }

    #[test]
    fn unterminated_rule_is_error() {
        let err = parse("A: a b").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("~~~"), "{err}");
    }

    #[test]
    fn terminator_must_stand_alone() {
        let err = parse("A: a ~~~").unwrap_err();
        assert!(err.message.contains("own line"), "{err}");
        let err = parse("A: a\n~~~ b").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn malformed_placeholder_is_error() {
        let err = parse("A:\n  <name:>\n~~~").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("placeholder"), "{err}");

        let err = parse("A: <name:ident\n~~~").unwrap_err();
        assert!(err.message.contains('>'), "{err}");
    }

    #[test]
    fn unterminated_separator_is_error() {
        let err = parse("A: <xs:ident> ** \",\"\n~~~").unwrap_err();
        assert!(err.message.contains(']'), "{err}");
    }

    #[test]
    fn empty_alternative_is_error() {
        let err = parse("A: a |\n~~~").unwrap_err();
        assert!(err.message.contains("at least one token"), "{err}");
    }

    #[test]
    fn duplicate_rule_reports_position() {
        let err = parse("A: a\n~~~\nA: b\n~~~").unwrap_err();
        assert_eq!((err.line, err.column), (3, 1));
        assert!(err.message.contains("duplicate rule name 'A'"));
    }

    #[test]
    fn duplicate_between_define_and_rule() {
        let err = parse("define A: 1;\nA: b\n~~~").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn nested_lists_up_to_the_cap() {
        let depth = MAX_LIST_NESTING;
        let src = format!("define l: {}1{};", "[".repeat(depth), "]".repeat(depth));
        let table = parse(&src).unwrap();
        assert!(table.get("l").unwrap().is_constant());
    }

    #[test]
    fn deeply_nested_list_is_error() {
        let depth = 100_000;
        let src = format!("define l: {}1{};", "[".repeat(depth), "]".repeat(depth));
        let err = parse(&src).unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, "define l: ".len() + MAX_LIST_NESTING + 2);
        assert!(err.message.contains("nested"), "{err}");
    }

    #[test]
    fn missing_define_semicolon() {
        let err = parse("define a: 1").unwrap_err();
        assert!(err.message.contains(';'), "{err}");
    }
}
