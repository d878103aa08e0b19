//! Static HTML dashboard.
//!
//! The page is the head template, generated sections, then the foot template. Charts are emitted
//! as Chart.js configurations; the library itself is expected to be loaded by the head template.
//! Rendering is deterministic: the same inputs always give the same bytes.

use std::{fs, path::Path};

use anyhow::Context;
use quick_xml::escape::escape;
use serde_json::{Value, json};

use crate::aggregate::{MonthlyCounts, Summary, Tally};

/// Slice colours of the country pie, reused cyclically.
pub const PALETTE: [&str; 21] = [
    "rgb(31 119 180)",
    "rgb(255 127 14)",
    "rgb(44 160 44)",
    "rgb(214 39 40)",
    "rgb(148 103 189)",
    "rgb(140 86 75)",
    "rgb(227 119 194)",
    "rgb(127 127 127)",
    "rgb(188 189 34)",
    "rgb(23 190 229)",
    "rgb(174 199 232)",
    "rgb(255 187 120)",
    "rgb(152 223 138)",
    "rgb(255 152 150)",
    "rgb(197 176 213)",
    "rgb(196 156 148)",
    "rgb(247 182 210)",
    "rgb(180 180 180)",
    "rgb(219 219 141)",
    "rgb(158 218 229)",
    "rgb(225 225 225)",
];

const BORDER_WIDTHS: [f64; 21] = [
    2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 0.5, 0.5, 0.5,
    0.5, 2.0,
];

/// Externally supplied page fragments.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub head: String,
    pub foot: String,
}

impl Templates {
    pub fn load(head: &Path, foot: &Path) -> anyhow::Result<Self> {
        let read = |p: &Path| {
            fs::read_to_string(p).with_context(|| format!("cannot read template {}", p.display()))
        };
        Ok(Templates {
            head: read(head)?,
            foot: read(foot)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// Countries shown individually in the pie chart.
    pub top_countries: usize,
    /// Rows of the country table.
    pub country_rows: usize,
    /// Minimum number of papers for a journal to be listed.
    pub min_journal: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            top_countries: 20,
            country_rows: 30,
            min_journal: 3,
        }
    }
}

/// Everything the page shows.
pub struct Dashboard<'a> {
    pub summary: &'a Summary,
    pub monthly: &'a MonthlyCounts,
    pub countries: &'a Tally,
    pub journals: &'a Tally,
}

pub fn render(dash: &Dashboard<'_>, templates: &Templates, options: &ReportOptions) -> String {
    let mut out = String::new();
    push_fragment(&mut out, &templates.head);
    out.push_str(&summary_section(dash.summary));
    out.push_str(&monthly_section(dash.monthly));
    out.push_str(&country_section(dash.countries, options));
    out.push_str(&journal_section(dash.journals, options.min_journal));
    push_fragment(&mut out, &templates.foot);
    out
}

fn push_fragment(out: &mut String, fragment: &str) {
    out.push_str(fragment);
    if !fragment.ends_with('\n') {
        out.push('\n');
    }
}

fn summary_section(summary: &Summary) -> String {
    let updated = summary
        .as_of
        .map(|date| format!("<h4>(updated on {date})</h4>\n"))
        .unwrap_or_default();
    format!(
        "{updated}<div id=\"summary\">\n\
         <div id=\"total\">{} preprints</div>\n\
         <div id=\"revisions\">{} revisions</div>\n\
         </div>\n",
        summary.preprints, summary.revisions
    )
}

/// Chart.js points for the monthly bar chart: completed months, then the current month.
///
/// The current month gets a trailing zero point on day 28 so its bar spans the month on a time
/// axis.
pub fn monthly_series(monthly: &MonthlyCounts) -> (Value, Value) {
    let completed: Vec<Value> = monthly
        .completed
        .iter()
        .map(|(ym, n)| json!({ "x": ym.first_day(), "y": n }))
        .collect();
    let current: Vec<Value> = monthly
        .current
        .iter()
        .flat_map(|(ym, n)| {
            [
                json!({ "x": ym.first_day(), "y": n }),
                json!({ "x": format!("{ym}-28"), "y": 0 }),
            ]
        })
        .collect();
    (Value::Array(completed), Value::Array(current))
}

fn monthly_section(monthly: &MonthlyCounts) -> String {
    let (completed, current) = monthly_series(monthly);
    format!(
        r#"
<h2>Preprints per month</h2>
<canvas id="monthlyChart" height="120"></canvas>
<script>
var ctx = document.getElementById('monthlyChart').getContext('2d');
var chart = new Chart(ctx, {{
    type: 'bar',
    data: {{
        datasets: [{{
            label: 'preprints per month',
            backgroundColor: 'rgba(99, 99, 255, 0.8)',
            data: {completed}
        }},{{
            label: 'current month',
            backgroundColor: 'rgba(140, 99, 255, 0.4)',
            data: {current}
        }}]
    }},
    options: {{
        scales: {{
            xAxes: [{{
                stacked: true,
                type: 'time',
                time: {{
                    unit: 'month'
                }}
            }}]
        }}
    }}
}});
</script>
"#
    )
}

/// Colour and border width for each of `n` slices, cycling through the palette.
pub fn slice_styles(n: usize) -> (Vec<&'static str>, Vec<f64>) {
    (0..n)
        .map(|i| (PALETTE[i % PALETTE.len()], BORDER_WIDTHS[i % BORDER_WIDTHS.len()]))
        .unzip()
}

fn table_rows<'a>(entries: impl IntoIterator<Item = (&'a str, usize)>) -> String {
    entries
        .into_iter()
        .map(|(label, n)| format!("<tr><td>{}</td><td>{n}</td></tr>\n", escape(label)))
        .collect()
}

fn country_section(countries: &Tally, options: &ReportOptions) -> String {
    let slices = countries.top_with_others(options.top_countries);
    let labels: Vec<&str> = slices.iter().map(|(label, _)| label.as_str()).collect();
    let data: Vec<usize> = slices.iter().map(|(_, n)| *n).collect();
    let (colours, borders) = slice_styles(slices.len());
    let rows = table_rows(countries.most_common().into_iter().take(options.country_rows));

    format!(
        r#"
<h2>Preprints per country</h2>
<div id="countryPie">
<canvas id="countryChart" height="200"></canvas>
</div>
<script>
var ctx = document.getElementById('countryChart').getContext('2d');
var chart = new Chart(ctx, {{
    type: 'pie',
    data: {{
        labels: {labels},
        datasets: [{{
            data: {data},
            backgroundColor: {colours},
            borderWidth: {borders}
        }}]
    }},
    options: {{cutoutPercentage: 10}}
}});
</script>
<div id="countryTable">
<table><thead><tr><th>Country</th><th># preprints</th></tr></thead><tbody>
{rows}</tbody></table>
</div>
"#,
        labels = json!(labels),
        data = json!(data),
        colours = json!(colours),
        borders = json!(borders),
    )
}

fn journal_section(journals: &Tally, min: usize) -> String {
    let rows = table_rows(journals.at_least(min));
    format!(
        r#"
<div class="clear"></div>
<h2>Preprints by journal</h2>
<p>What are the journals in which preprints are published (after peer review)?
   The top journals are:</p>
<table id="journalTable"><thead><tr><th>Journal</th><th># preprints</th></tr></thead><tbody>
{rows}</tbody>
<tfoot><tr><td colspan="2">Show all journals with at least {min} papers</td></tr></tfoot></table>
"#
    )
}
