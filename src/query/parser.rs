//! Query Compiler
//!
//! Compiles query strings into a [`TargetSeries`].
//!
//! # Supported Syntax
//!
//! ```text
//! [lookback<] measurement.field[.filter][=>stage,arg,...][=>stage,arg,...]
//! ```
//!
//! The selection clause is split into at most three `.` segments, so the
//! filter may itself contain dots. Trailing empty stage segments and
//! arguments (`cpu.usage=>`, `=>add,`) are ignored. Stage arguments are coerced lexically
//! (see [`coerce_argument`](crate::stage::coerce_argument)).
//!
//! # Examples
//!
//! ```text
//! cpu.usage
//! cpu.usage.host=web1
//! cpu.usage.host=web1|host=web2=>add,10
//! cpu.usage=>mult,2.5=>mean,60
//! 7d<cpu.usage.region~us^*
//! ```

use crate::filter::{filter_tokens, parse_filter_expression};
use crate::query::ast::TargetSeries;
use crate::query::error::{QueryError, QueryResult};
use crate::stage::{coerce_arguments, StageChain, StageTemplate};

const STAGE_SEPARATOR: &str = "=>";

/// Compile a query string
pub fn compile_query(query: &str) -> QueryResult<TargetSeries> {
    if query.is_empty() {
        return Err(QueryError::syntax("empty query"));
    }

    let (lookback, rest) = split_lookback(query);

    let mut segments = split_trimmed(rest, STAGE_SEPARATOR).into_iter();
    let selection = segments.next().unwrap_or_default();

    let mut parts = selection.splitn(3, '.');
    let measurement = parts.next().unwrap_or_default();
    let field = parts
        .next()
        .ok_or_else(|| QueryError::syntax(format!("missing field name in '{}'", selection)))?;

    if measurement.is_empty() {
        return Err(QueryError::syntax(format!(
            "missing measurement name in '{}'",
            selection
        )));
    }
    if field.is_empty() {
        return Err(QueryError::syntax(format!(
            "missing field name in '{}'",
            selection
        )));
    }

    let mut target = TargetSeries::new(measurement, field);

    if let Some(expression) = parts.next() {
        let predicate = parse_filter_expression(expression).map_err(|e| {
            QueryError::syntax_caused_by(format!("invalid filter '{}'", expression), e)
        })?;
        target = target.with_expression(predicate, filter_tokens(expression));
    }

    let templates = segments
        .map(compile_stage)
        .collect::<QueryResult<Vec<_>>>()?;
    if !templates.is_empty() {
        target = target.with_stages(StageChain::new(templates));
    }

    if let Some(lookback) = lookback {
        target = target.with_lookback(lookback);
    }

    tracing::debug!(
        query,
        selector = %target.selector(),
        filter_tokens = target.filter_elements.len(),
        stages = target.stages.as_ref().map(StageChain::len).unwrap_or(0),
        "Compiled query"
    );

    Ok(target)
}

/// Split off a `...<` or `...<=` prefix that precedes the first `.`
fn split_lookback(query: &str) -> (Option<&str>, &str) {
    let Some(lt) = query.find('<') else {
        return (None, query);
    };
    if query.find('.').is_some_and(|dot| dot < lt) {
        return (None, query);
    }

    let mut end = lt + 1;
    if query[end..].starts_with('=') {
        end += 1;
    }
    (Some(&query[..end]), &query[end..])
}

/// Split on `separator`, dropping trailing empty pieces but keeping the first
fn split_trimmed<'a>(input: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces: Vec<&str> = input.split(separator).collect();
    while pieces.len() > 1 && pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }
    pieces
}

/// Compile one `name,arg,...` stage segment
fn compile_stage(segment: &str) -> QueryResult<StageTemplate> {
    let mut tokens = split_trimmed(segment, ",").into_iter();
    let name = tokens.next().unwrap_or_default();
    StageTemplate::new(name, coerce_arguments(tokens))
}
