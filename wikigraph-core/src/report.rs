// Report generation from a followed crawl

use crate::crawl::FollowOutcome;
use crate::graph::GraphExport;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

/// Pages listed in the "most linked" section.
pub const TOP_LINKED_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkedPage {
    pub id: String,
    pub inbound: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub page: String,
    pub depth: u8,
    pub max_pages: u32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub duration_ms: u128,
    pub progress: usize,
    pub total: usize,
    pub total_pages: usize,
    pub total_links: usize,
    pub pages_per_depth: BTreeMap<u32, usize>,
    pub top_linked: Vec<LinkedPage>,
    pub graph: GraphExport,
}

pub fn gather_report_data(outcome: &FollowOutcome) -> ReportData {
    let graph = outcome.snapshot.export();

    let mut pages_per_depth = BTreeMap::new();
    for node in &graph.nodes {
        *pages_per_depth.entry(node.depth).or_insert(0) += 1;
    }

    let mut inbound: HashMap<&str, usize> = HashMap::new();
    for edge in graph.edges.iter().filter(|e| !e.is_self_loop()) {
        *inbound.entry(edge.target.as_str()).or_insert(0) += 1;
    }
    let mut top_linked: Vec<LinkedPage> = inbound
        .into_iter()
        .map(|(id, inbound)| LinkedPage {
            id: id.to_string(),
            inbound,
        })
        .collect();
    top_linked.sort_by(|a, b| b.inbound.cmp(&a.inbound).then_with(|| a.id.cmp(&b.id)));
    top_linked.truncate(TOP_LINKED_LIMIT);

    let failure = match &outcome.state {
        SessionState::Failed(failure) => Some(failure.to_string()),
        _ => None,
    };

    ReportData {
        page: outcome.request.page().to_string(),
        depth: outcome.request.depth(),
        max_pages: outcome.request.max_pages(),
        status: outcome.state.to_string(),
        failure,
        duration_ms: outcome.elapsed.as_millis(),
        progress: outcome.progress,
        total: outcome.total,
        total_pages: graph.nodes.len(),
        total_links: graph.edges.len(),
        pages_per_depth,
        top_linked,
        graph,
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                           WIKIGRAPH CRAWL REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Start Page:   {}\n", data.page.replace('_', " ")));
    report.push_str(&format!("Depth:        {}\n", data.depth));
    report.push_str(&format!("Max Pages:    {}\n", data.max_pages));
    report.push_str(&format!("Status:       {}\n", data.status));
    if let Some(ref failure) = data.failure {
        report.push_str(&format!("Reason:       {}\n", failure));
    }
    report.push_str(&format!(
        "Duration:     {:.1} seconds\n",
        data.duration_ms as f64 / 1000.0
    ));
    report.push_str(&format!("Pages Found:  {}\n", data.total_pages));
    report.push_str(&format!("Links Found:  {}\n", data.total_links));
    report.push('\n');

    report.push_str(HEAVY_RULE);
    report.push_str("PAGES PER DEPTH\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');
    if data.pages_per_depth.is_empty() {
        report.push_str("  (no pages)\n");
    }
    for (depth, count) in &data.pages_per_depth {
        report.push_str(&format!("  depth {}   {}\n", depth, count));
    }
    report.push('\n');

    if !data.top_linked.is_empty() {
        report.push_str(HEAVY_RULE);
        report.push_str("MOST LINKED PAGES\n");
        report.push_str(HEAVY_RULE);
        report.push('\n');
        for (idx, page) in data.top_linked.iter().enumerate() {
            report.push_str(&format!(
                "  [{:>2}] {:<50} {} inbound\n",
                idx + 1,
                page.id.replace('_', " "),
                page.inbound
            ));
        }
        report.push('\n');
    }

    report.push_str(HEAVY_RULE);
    report.push_str("                              End of Report\n");
    report.push_str(HEAVY_RULE);
    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "wikigraph",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "crawl": {
                "page": data.page,
                "depth": data.depth,
                "max_pages": data.max_pages,
                "status": data.status,
                "failure": data.failure,
                "duration_ms": data.duration_ms,
                "progress": data.progress,
                "total": data.total
            },
            "summary": {
                "total_pages": data.total_pages,
                "total_links": data.total_links,
                "pages_per_depth": data.pages_per_depth,
                "top_linked": data.top_linked
            },
            "graph": data.graph
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
