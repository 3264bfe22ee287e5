//! Query-string construction for the PostgREST table API.

use crate::models::{BlockColumn, BlockListQuery};

const PROFILE_SUMMARY_COLUMNS: &str = "id,full_name,email,avatar_url";

/// Search columns matched by free text.
const SEARCH_COLUMNS: [BlockColumn; 4] = [
    BlockColumn::BlockerName,
    BlockColumn::BlockerEmail,
    BlockColumn::BlockedName,
    BlockColumn::BlockedEmail,
];

/// Block rows with both parties' profiles embedded. `!inner` lets filters on
/// the embedded columns drop whole rows.
pub fn block_select(profiles_table: &str) -> String {
    format!(
        "id,blocker_id,blocked_id,reason,created_at,\
         blocker:{p}!blocker_id!inner({c}),\
         blocked:{p}!blocked_id!inner({c})",
        p = profiles_table,
        c = PROFILE_SUMMARY_COLUMNS
    )
}

/// Strips characters PostgREST treats as syntax inside filter values.
pub fn clean_pattern(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"' | '\\' | ':' | '%'))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn ilike(value: &str) -> String {
    format!("ilike.*{}*", clean_pattern(value))
}

pub fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn order_key(column: BlockColumn) -> String {
    match column.as_str().split_once('.') {
        Some((embed, field)) => format!("{}({})", embed, field),
        None => column.as_str().to_string(),
    }
}

pub fn block_list_params(query: &BlockListQuery, profiles_table: &str) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), block_select(profiles_table))];

    if let Some(blocker_id) = &query.blocker_scope {
        params.push(("blocker_id".to_string(), eq(blocker_id)));
    }

    for (column, value) in &query.filters {
        params.push((column.as_str().to_string(), ilike(value)));
    }

    if let Some(search) = query.search.as_deref().map(clean_pattern).filter(|s| !s.is_empty()) {
        let clauses: Vec<String> = SEARCH_COLUMNS
            .iter()
            .map(|column| format!("{}.ilike.*{}*", column.as_str(), search))
            .collect();
        params.push(("or".to_string(), format!("({})", clauses.join(","))));
    }

    let direction = if query.sort.descending { "desc" } else { "asc" };
    let mut order = format!("{}.{}", order_key(query.sort.column), direction);
    if query.sort.column != BlockColumn::CreatedAt {
        order.push_str(",created_at.desc");
    }
    params.push(("order".to_string(), order));
    params.push(("offset".to_string(), query.page.offset().to_string()));
    params.push(("limit".to_string(), query.page.limit.to_string()));
    params
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/0`.
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}
