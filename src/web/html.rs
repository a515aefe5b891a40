//! Server-rendered search page.

use std::num::NonZeroUsize;

use url::form_urlencoded;

use crate::config::Config;
use crate::semantic::preprocess::snippet;
use crate::semantic::{PageRequest, PageResult, RankedResult};

/// Characters of a critique shown before "show more".
const SNIPPET_CHARS: usize = 200;

/// Pages linked on each side of the current one.
const NAV_WINDOW: usize = 2;

/// One element of the pagination bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavItem {
    Previous(usize),
    Page { number: usize, current: bool },
    Gap,
    Next(usize),
}

/// Pagination bar around `page`: first and last page, `window` pages on each
/// side of the current one, gaps where pages are skipped.
pub fn navigation(page: usize, total_pages: usize, window: usize) -> Vec<NavItem> {
    let mut items = Vec::new();
    let start = page.saturating_sub(window).max(1);
    let end = page.saturating_add(window).min(total_pages);

    if page > 1 {
        items.push(NavItem::Previous(page - 1));
    }

    if start > 1 {
        items.push(NavItem::Page {
            number: 1,
            current: false,
        });
        if start > 2 {
            items.push(NavItem::Gap);
        }
    }

    for number in start..=end {
        items.push(NavItem::Page {
            number,
            current: number == page,
        });
    }

    if end < total_pages {
        if end + 1 < total_pages {
            items.push(NavItem::Gap);
        }
        items.push(NavItem::Page {
            number: total_pages,
            current: false,
        });
    }

    if page < total_pages {
        items.push(NavItem::Next(page + 1));
    }

    items
}

/// Navigation is pointless when the limit already fits on one page.
fn shows_navigation(result: &PageResult, limit: Option<NonZeroUsize>) -> bool {
    result.total_pages > 1 && limit.map_or(true, |l| l.get() > result.per_page)
}

/// Tailwind text colour for a similarity score.
pub fn score_class(score: f32) -> &'static str {
    if score >= 0.8 {
        "text-green-600"
    } else if score >= 0.6 {
        "text-yellow-600"
    } else if score >= 0.4 {
        "text-orange-600"
    } else {
        "text-red-600"
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Link to `page` of the same search, optionally with a limit.
fn search_href(request: &PageRequest, page: usize, limit: Option<NonZeroUsize>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("corpus", &request.corpus)
        .append_pair("text", &request.query_text)
        .append_pair("page", &page.to_string())
        .append_pair("per_page", &request.per_page.to_string());
    if let Some(limit) = limit {
        query.append_pair("limit", &limit.to_string());
    }
    format!("/?{}", escape_html(&query.finish()))
}

fn render_result(item: &RankedResult) -> String {
    let (short, truncated) = snippet(&item.text, SNIPPET_CHARS);
    let toggle = if truncated {
        r#"<button type="button" class="toggle-btn mt-2 text-blue-500 hover:text-blue-700 text-sm">Show more</button>
        <p class="full-text hidden mt-2">"#
            .to_string()
            + &escape_html(&item.text)
            + "</p>"
    } else {
        String::new()
    };

    format!(
        r#"<div class="bg-white rounded-xl shadow-md p-6 mb-4 result-item">
    <div class="flex justify-between items-start mb-3">
        <span class="text-sm text-gray-500">ID: {row}</span>
        <span class="text-lg font-semibold {class}">{percent:.1}% similar</span>
    </div>
    <div class="text-gray-800 break-words">
        <p class="short-text">{short}</p>
        {toggle}
    </div>
</div>"#,
        row = item.row,
        class = score_class(item.score),
        percent = item.score * 100.0,
        short = escape_html(&short),
        toggle = toggle,
    )
}

fn render_navigation(request: &PageRequest, result: &PageResult) -> String {
    if !shows_navigation(result, request.limit) {
        return String::new();
    }

    let link = |page: usize, label: &str, active: bool| {
        let class = if active {
            "bg-blue-500 text-white"
        } else {
            "bg-gray-200 hover:bg-gray-300 text-gray-800"
        };
        format!(
            r#"<a href="{}" class="px-4 py-2 rounded-lg {}">{}</a>"#,
            search_href(request, page, request.limit),
            class,
            label
        )
    };

    let items: String = navigation(result.page, result.total_pages, NAV_WINDOW)
        .into_iter()
        .map(|item| match item {
            NavItem::Previous(page) => link(page, "&laquo;", false),
            NavItem::Page { number, current } => link(number, &number.to_string(), current),
            NavItem::Gap => r#"<span class="px-2 py-2 text-gray-800">...</span>"#.to_string(),
            NavItem::Next(page) => link(page, "&raquo;", false),
        })
        .collect();

    format!(r#"<nav class="flex space-x-2 mt-8 justify-center">{items}</nav>"#)
}

fn render_filter(request: &PageRequest) -> String {
    let remove = match request.limit {
        Some(_) => format!(
            r#"<a href="{}" class="bg-red-500 text-white rounded-lg px-4 py-2">Remove filter</a>"#,
            search_href(request, 1, None)
        ),
        None => String::new(),
    };

    format!(
        r#"<form method="get" class="bg-blue-50 p-4 rounded-xl mb-6 flex gap-4 items-center">
    <input type="hidden" name="corpus" value="{corpus}">
    <input type="hidden" name="text" value="{text}">
    <input type="hidden" name="page" value="1">
    <input type="hidden" name="per_page" value="{per_page}">
    <label class="text-gray-700 font-medium">Limit the number of results:</label>
    <input type="number" name="limit" value="{limit}" min="1" class="border rounded-lg p-2 w-32" placeholder="e.g. 6">
    <button type="submit" class="bg-green-500 text-white rounded-lg px-4 py-2">Apply</button>
    {remove}
</form>"#,
        corpus = escape_html(&request.corpus),
        text = escape_html(&request.query_text),
        per_page = request.per_page,
        limit = request.limit.map(|l| l.to_string()).unwrap_or_default(),
        remove = remove,
    )
}

fn render_results(request: &PageRequest, result: &PageResult) -> String {
    let items: String = if result.items.is_empty() {
        r#"<p class="text-center text-gray-500 py-8">No results on this page.</p>"#.to_string()
    } else {
        result.items.iter().map(render_result).collect()
    };

    format!(
        r#"<hr class="border-gray-200 my-6">
<h2 class="text-2xl font-bold mb-6 text-gray-800">Results <span class="text-base font-normal text-gray-500">({total} critiques)</span></h2>
{filter}
<div class="space-y-4">{items}</div>
{nav}"#,
        total = result.total_results,
        filter = render_filter(request),
        items = items,
        nav = render_navigation(request, result),
    )
}

const PLACEHOLDER: &str = r#"<div class="text-center py-12">
    <h3 class="text-xl font-semibold text-gray-700">Enter a critique to see results</h3>
    <p class="text-gray-500 mt-2">Discover critiques similar to yours</p>
</div>"#;

const TOGGLE_SCRIPT: &str = r#"<script>
document.addEventListener("DOMContentLoaded", () => {
    document.querySelectorAll(".toggle-btn").forEach(btn => {
        btn.addEventListener("click", () => {
            const container = btn.parentElement;
            const shortText = container.querySelector(".short-text");
            const fullText = container.querySelector(".full-text");
            const expanded = shortText.classList.toggle("hidden");
            fullText.classList.toggle("hidden", !expanded);
            btn.textContent = expanded ? "Show less" : "Show more";
        });
    });
});
</script>"#;

/// Render the whole page. `result` is `None` when no query was submitted.
pub fn render_page(config: &Config, request: &PageRequest, result: Option<&PageResult>) -> String {
    let options: String = config
        .corpora
        .keys()
        .map(|name| {
            format!(
                r#"<option value="{value}"{selected}>{title}</option>"#,
                value = escape_html(name),
                selected = if *name == request.corpus { " selected" } else { "" },
                title = escape_html(config.corpus_title(name)),
            )
        })
        .collect();

    let body = match result {
        Some(result) => render_results(request, result),
        None => PLACEHOLDER.to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Critique Recommender</title>
    <link href="https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css" rel="stylesheet">
    {script}
</head>
<body class="min-h-screen bg-gradient-to-r from-blue-700 via-purple-700 to-gray-900">
<div class="max-w-6xl mx-auto px-4 py-8">
    <header class="text-center mb-12">
        <h1 class="text-5xl font-bold mb-4 text-white">Critique Recommender</h1>
        <p class="text-2xl text-white">Find critiques similar to yours</p>
    </header>
    <main class="bg-white rounded-2xl shadow-2xl p-6 md:p-8">
        <form method="get" class="space-y-6 mb-8">
            <div class="grid grid-cols-1 md:grid-cols-2 gap-6">
                <label class="block text-lg font-medium text-gray-700">Film
                    <select name="corpus" class="w-full border border-gray-300 rounded-xl p-3">{options}</select>
                </label>
                <label class="block text-lg font-medium text-gray-700">Results per page
                    <input type="number" name="per_page" value="{per_page}" min="1" max="{max_per_page}" class="w-full border border-gray-300 rounded-xl p-3">
                </label>
            </div>
            <label class="block text-lg font-medium text-gray-700">Your critique
                <textarea name="text" rows="4" placeholder="Write your critique here..." class="w-full border border-gray-300 rounded-xl p-4">{text}</textarea>
            </label>
            <button type="submit" class="w-full bg-blue-700 text-white rounded-xl py-4 px-6 font-semibold text-lg">Find similar critiques</button>
        </form>
        {body}
    </main>
</div>
</body>
</html>"#,
        script = TOGGLE_SCRIPT,
        options = options,
        per_page = request.per_page,
        max_per_page = config.max_per_page,
        text = escape_html(&request.query_text),
        body = body,
    )
}
