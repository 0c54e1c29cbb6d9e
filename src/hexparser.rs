//! Surface-syntax parser for HEX programs.
//!
//! Grounded in the teacher's `parser/mod.rs` comment-stripping strategy
//! (`%`-comments outside string literals, block comments ignored here since
//! HEX source only uses `%`). Rules are split on top-level `.` rather than by
//! line, since HEX rules may span multiple lines and multiple statements may
//! share one line. This parser covers disjunctive rules, constraints, weak
//! constraints, NAF, external atoms and the `#count/#sum/#min/#max/#avg/#times`
//! aggregate forms -- deep enough to drive grounding end to end, not a full
//! grammar.

use crate::ast::{
    AggregateAtom, AggregateFunc, BuiltinAtom, ExternalAtom, Literal, OrdinaryAtom, Program, Rule,
    Term,
};
use crate::error::{HexError, HexResult};

const BUILTIN_OPS: &[&str] = &["=", "<>", "!=", "<=", ">=", "<", ">"];

/// Strips `%` line comments, respecting string literals.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut in_string = false;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            in_string = !in_string;
            out.push(c);
        } else if c == '%' && !in_string {
            while let Some(&next) = chars.peek() {
                if next == '\n' {
                    break;
                }
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits source into top-level `.`-terminated statements, respecting
/// parens/brackets and string literals so `.` inside e.g. `[3.5]` or a quoted
/// string never splits a statement early. HEX does not use floats, but the
/// guard costs nothing and keeps this robust.
fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;
    for c in source.chars() {
        if c == '"' {
            in_string = !in_string;
            current.push(c);
            continue;
        }
        if in_string {
            current.push(c);
            continue;
        }
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            '.' if depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    statements.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let trailing = current.trim();
    if !trailing.is_empty() {
        statements.push(trailing.to_string());
    }
    statements
}

/// Parses a whole HEX program.
pub fn parse_program(source: &str) -> HexResult<Program> {
    let cleaned = strip_comments(source);
    let mut program = Program::default();
    for statement in split_statements(&cleaned) {
        if let Some(rest) = statement.strip_prefix("#maxint") {
            let rest = rest.trim_start_matches('=').trim();
            program.max_int = Some(rest.parse::<i32>().map_err(|_| {
                HexError::syntax("<input>", 0, format!("invalid #maxint value: '{rest}'"))
            })?);
            continue;
        }
        if let Some(rest) = statement.strip_prefix("#namespace") {
            let inner = rest.trim().trim_start_matches('(').trim_end_matches(')');
            let mut parts = inner.splitn(2, ',');
            let prefix = parts.next().unwrap_or_default().trim().to_string();
            let uri = parts.next().unwrap_or_default().trim().trim_matches('"').to_string();
            program.namespaces.push((prefix, uri));
            continue;
        }
        program.rules.push(parse_rule(&statement)?);
    }
    Ok(program)
}

/// Parses one rule body (without the trailing `.`).
fn parse_rule(statement: &str) -> HexResult<Rule> {
    if let Some(idx) = top_level_find(statement, ":~") {
        let body_str = statement[idx + 2..].trim();
        let (body_part, weight_part) = split_weak_weight(body_str)?;
        let body = parse_body(body_part.trim())?;
        return Ok(Rule {
            head: Vec::new(),
            body,
            weight_level: Some(weight_part),
        });
    }
    if let Some(idx) = top_level_find(statement, ":-") {
        let head_str = statement[..idx].trim();
        let body_str = statement[idx + 2..].trim();
        let head = parse_head(head_str)?;
        let body = parse_body(body_str)?;
        return Ok(Rule {
            head,
            body,
            weight_level: None,
        });
    }
    // fact or disjunctive fact, no body
    let head = parse_head(statement.trim())?;
    Ok(Rule {
        head,
        body: Vec::new(),
        weight_level: None,
    })
}

fn split_weak_weight(s: &str) -> HexResult<(&str, (Term, Term))> {
    let open = s.rfind('[').ok_or_else(|| {
        HexError::syntax("<input>", 0, "weak constraint missing '[weight:level]'")
    })?;
    let close = s.rfind(']').ok_or_else(|| {
        HexError::syntax("<input>", 0, "weak constraint missing closing ']'")
    })?;
    let body = &s[..open];
    let inner = &s[open + 1..close];
    let mut parts = inner.splitn(2, ':');
    let weight = parts.next().unwrap_or("1").trim();
    let level = parts.next().unwrap_or("1").trim();
    let weight_term = parse_term(weight)?;
    let level_term = parse_term(level)?;
    Ok((body, (weight_term, level_term)))
}

fn parse_head(s: &str) -> HexResult<Vec<OrdinaryAtom>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    top_level_split(s, '|')
        .into_iter()
        .map(|piece| parse_ordinary_atom(piece.trim()))
        .collect()
}

fn parse_body(s: &str) -> HexResult<Vec<Literal>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    top_level_split(s, ',')
        .into_iter()
        .map(|piece| parse_literal(piece.trim()))
        .collect()
}

fn parse_literal(s: &str) -> HexResult<Literal> {
    let (naf, rest) = strip_naf(s);
    if rest.starts_with('&') {
        return Ok(Literal::External(parse_external_atom(naf, rest)?));
    }
    if rest.starts_with('#') {
        return Ok(Literal::Aggregate(Box::new(parse_aggregate_atom(naf, rest)?)));
    }
    if let Some((op, args)) = try_parse_builtin(rest)? {
        return Ok(Literal::Builtin(BuiltinAtom { naf, op, args }));
    }
    Ok(Literal::Ordinary(parse_ordinary_atom_naf(naf, rest)?))
}

fn strip_naf(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix("not ") {
        (true, rest.trim_start())
    } else if let Some(rest) = s.strip_prefix("not(") {
        (true, rest.trim_start())
    } else {
        (false, s)
    }
}

fn try_parse_builtin(s: &str) -> HexResult<Option<(String, Vec<Term>)>> {
    for op in BUILTIN_OPS {
        if let Some(idx) = top_level_find(s, op) {
            // avoid matching the '=' inside '<=' / '>=' / '!=' twice
            if *op == "=" && idx > 0 && matches!(s.as_bytes()[idx - 1], b'<' | b'>' | b'!') {
                continue;
            }
            let lhs = parse_term(s[..idx].trim())?;
            let rhs = parse_term(s[idx + op.len()..].trim())?;
            return Ok(Some(((*op).to_string(), vec![lhs, rhs])));
        }
    }
    Ok(None)
}

fn parse_ordinary_atom(s: &str) -> HexResult<OrdinaryAtom> {
    let (naf, rest) = strip_naf(s);
    parse_ordinary_atom_naf(naf, rest)
}

fn parse_ordinary_atom_naf(naf: bool, s: &str) -> HexResult<OrdinaryAtom> {
    let (predicate, args) = split_functor(s)?;
    Ok(OrdinaryAtom { naf, predicate, args })
}

fn parse_external_atom(naf: bool, s: &str) -> HexResult<ExternalAtom> {
    let s = s.strip_prefix('&').unwrap_or(s);
    let bracket_open = s.find('[');
    let (name, rest) = match bracket_open {
        Some(idx) => (s[..idx].trim().to_string(), &s[idx..]),
        None => {
            let paren = s.find('(').unwrap_or(s.len());
            (s[..paren].trim().to_string(), &s[paren..])
        }
    };
    let (inputs, after_inputs) = if let Some(rest2) = rest.strip_prefix('[') {
        let close = rest2
            .find(']')
            .ok_or_else(|| HexError::syntax("<input>", 0, "unterminated external atom input list"))?;
        let inputs = parse_term_list(&rest2[..close])?;
        (inputs, &rest2[close + 1..])
    } else {
        (Vec::new(), rest)
    };
    let outputs = if let Some(rest3) = after_inputs.trim().strip_prefix('(') {
        let close = rest3
            .rfind(')')
            .ok_or_else(|| HexError::syntax("<input>", 0, "unterminated external atom output list"))?;
        parse_term_list(&rest3[..close])?
    } else {
        Vec::new()
    };
    Ok(ExternalAtom {
        naf,
        name,
        inputs,
        outputs,
    })
}

fn parse_aggregate_atom(naf: bool, s: &str) -> HexResult<AggregateAtom> {
    // Forms handled: `X = #count{V : body}` and `L <= #count{V : body} <= U`.
    let hash = s.find('#').ok_or_else(|| HexError::syntax("<input>", 0, "expected aggregate"))?;
    let before = s[..hash].trim();
    let after_hash = &s[hash + 1..];
    let brace_open = after_hash
        .find('{')
        .ok_or_else(|| HexError::syntax("<input>", 0, "expected '{' in aggregate"))?;
    let func_name = after_hash[..brace_open].trim();
    let func = AggregateFunc::parse(func_name)
        .ok_or_else(|| HexError::syntax("<input>", 0, format!("unknown aggregate function '{func_name}'")))?;
    let brace_close = after_hash
        .rfind('}')
        .ok_or_else(|| HexError::syntax("<input>", 0, "unterminated aggregate body"))?;
    let inner = &after_hash[brace_open + 1..brace_close];
    let mut parts = inner.splitn(2, ':');
    let vars_str = parts.next().unwrap_or_default();
    let body_str = parts.next().unwrap_or_default();
    let result_vars = parse_term_list(vars_str)?;
    let body = parse_body(body_str.trim())?;
    let after_brace = after_hash[brace_close + 1..].trim();

    let mut lower_bound = None;
    let mut upper_bound = None;
    if !before.is_empty() {
        // `L <=` / `L <` prefix
        for op in ["<=", "<"] {
            if let Some(stripped) = before.strip_suffix(op) {
                lower_bound = Some(parse_term(stripped.trim())?);
                break;
            }
        }
    }
    if !after_brace.is_empty() {
        for op in ["<=", "<", "="] {
            if let Some(stripped) = after_brace.strip_prefix(op) {
                upper_bound = Some(parse_term(stripped.trim())?);
                break;
            }
        }
    }
    if lower_bound.is_none() && upper_bound.is_none() && !before.is_empty() {
        // `X = #count{...}` form: treat the equality target as the upper bound
        // and also the lower bound, i.e. an exact-value constraint.
        if let Some(stripped) = before.strip_suffix('=') {
            let term = parse_term(stripped.trim())?;
            lower_bound = Some(term.clone());
            upper_bound = Some(term);
        }
    }

    Ok(AggregateAtom {
        naf,
        func,
        lower_bound,
        upper_bound,
        result_vars,
        body,
    })
}

fn split_functor(s: &str) -> HexResult<(String, Vec<Term>)> {
    let s = s.trim();
    match s.find('(') {
        None => Ok((s.to_string(), Vec::new())),
        Some(idx) => {
            let predicate = s[..idx].trim().to_string();
            let close = s
                .rfind(')')
                .ok_or_else(|| HexError::syntax("<input>", 0, format!("unterminated atom '{s}'")))?;
            let args = parse_term_list(&s[idx + 1..close])?;
            Ok((predicate, args))
        }
    }
}

fn parse_term_list(s: &str) -> HexResult<Vec<Term>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }
    top_level_split(s, ',')
        .into_iter()
        .map(|piece| parse_term(piece.trim()))
        .collect()
}

fn parse_term(s: &str) -> HexResult<Term> {
    let s = s.trim();
    if s.is_empty() {
        return Err(HexError::syntax("<input>", 0, "empty term"));
    }
    if let Some(stripped) = s.strip_prefix('"') {
        let inner = stripped.strip_suffix('"').unwrap_or(stripped);
        return Ok(Term::QuotedString(inner.to_string()));
    }
    if s == "_" {
        return Ok(Term::Variable("_".to_string()));
    }
    if let Ok(n) = s.parse::<i32>() {
        return Ok(Term::Integer(n));
    }
    if let Some(idx) = s.find('(') {
        let functor = s[..idx].trim().to_string();
        let close = s
            .rfind(')')
            .ok_or_else(|| HexError::syntax("<input>", 0, format!("unterminated term '{s}'")))?;
        let args = parse_term_list(&s[idx + 1..close])?;
        return Ok(Term::Nested { functor, args });
    }
    let first = s.chars().next().unwrap();
    if first.is_uppercase() || first == '_' {
        Ok(Term::Variable(s.to_string()))
    } else {
        Ok(Term::Constant(s.to_string()))
    }
}

/// Finds the first top-level occurrence of `needle`, skipping over
/// parens/brackets and string literals.
fn top_level_find(haystack: &str, needle: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let needle_bytes = needle.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '"' {
            in_string = !in_string;
        } else if !in_string {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
            if depth == 0 && bytes[i..].starts_with(needle_bytes) {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Splits `s` on top-level occurrences of `sep`, skipping over
/// parens/brackets/braces and string literals.
fn top_level_split(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;
    for c in s.chars() {
        if c == '"' {
            in_string = !in_string;
            current.push(c);
            continue;
        }
        if in_string {
            current.push(c);
            continue;
        }
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            _ if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || parts.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fact() {
        let program = parse_program("node(a). node(b).").unwrap();
        assert_eq!(program.rules.len(), 2);
        assert!(program.rules[0].is_fact());
    }

    #[test]
    fn parses_disjunctive_rule_with_naf() {
        let program = parse_program("in(X) | out(X) :- node(X), not skip(X).").unwrap();
        let rule = &program.rules[0];
        assert_eq!(rule.head.len(), 2);
        assert_eq!(rule.body.len(), 2);
        assert!(rule.body[1].naf());
    }

    #[test]
    fn parses_external_atom_with_input_and_output_lists() {
        let program = parse_program("reach(X,Y) :- &transitiveClosure[edge](X,Y).").unwrap();
        let lit = &program.rules[0].body[0];
        match lit {
            Literal::External(ext) => {
                assert_eq!(ext.name, "transitiveClosure");
                assert_eq!(ext.inputs.len(), 1);
                assert_eq!(ext.outputs.len(), 2);
            }
            _ => panic!("expected external atom"),
        }
    }

    #[test]
    fn parses_weak_constraint() {
        let program = parse_program(":~ selected(X), cost(X,C). [C:1]").unwrap();
        assert!(program.rules[0].is_weak_constraint());
    }

    #[test]
    fn strips_percent_comments_outside_strings() {
        let cleaned = strip_comments("p(a). % a comment\nq(\"x % not a comment\").");
        assert!(cleaned.contains("q(\"x % not a comment\")"));
        assert!(!cleaned.contains("a comment\n"));
    }

    #[test]
    fn parses_maxint_directive() {
        let program = parse_program("#maxint = 5.\np(1).").unwrap();
        assert_eq!(program.max_int, Some(5));
    }
}
