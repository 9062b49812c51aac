use serde::Serialize;

use crate::geom::{Rect, bounding_rect};
use crate::span::TextSpan;

/// Declaration order is the tie-break order of the alignment vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Right,
    Center,
    Justify,
}

const ALIGNMENTS: [Alignment; 4] = [
    Alignment::Left,
    Alignment::Right,
    Alignment::Center,
    Alignment::Justify,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupingTolerances {
    /// Gap allowed between a span and a block box for the span to join it.
    pub merge: f32,
    /// Largest font size difference inside one block.
    pub size: f32,
    /// Baseline distance inside one line cluster.
    pub line: f32,
    /// Offset from a block edge still counted as touching it.
    pub edge: f32,
}

impl Default for GroupingTolerances {
    fn default() -> Self {
        Self {
            merge: 6.0,
            size: 0.5,
            line: 1.0,
            edge: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    pub spans: Vec<TextSpan>,
    pub bbox: Rect,
    pub size: f32,
    pub alignment: Alignment,
    pub line_count: usize,
}

impl TextBlock {
    /// Baseline of the topmost line; reflowed text is anchored here.
    pub fn first_baseline(&self) -> f32 {
        self.spans
            .iter()
            .map(|span| span.origin.y)
            .fold(f32::INFINITY, f32::min)
    }

    pub fn is_heading(&self) -> bool {
        self.size > 14.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineCluster {
    pub baseline: f32,
    pub bbox: Rect,
}

struct PendingBlock {
    spans: Vec<TextSpan>,
    bbox: Rect,
    size: f32,
}

/// Single pass over `spans` in the order given: each span joins the first
/// block it is close to, and blocks are never merged afterwards.
pub fn group_spans(spans: Vec<TextSpan>, tolerances: &GroupingTolerances) -> Vec<TextBlock> {
    let mut pending: Vec<PendingBlock> = Vec::new();
    for span in spans {
        let target = pending.iter_mut().find(|block| {
            (span.size - block.size).abs() <= tolerances.size
                && block.bbox.near(&span.bbox, tolerances.merge)
        });
        match target {
            Some(block) => {
                block.bbox = block.bbox.union(&span.bbox);
                block.spans.push(span);
            }
            None => pending.push(PendingBlock {
                bbox: span.bbox,
                size: span.size,
                spans: vec![span],
            }),
        }
    }
    pending
        .into_iter()
        .map(|block| {
            let clusters = line_clusters(&block.spans, tolerances.line);
            let alignment = infer_alignment(&block.bbox, &clusters, tolerances.edge);
            TextBlock {
                line_count: clusters.len(),
                alignment,
                bbox: block.bbox,
                size: block.size,
                spans: block.spans,
            }
        })
        .collect()
}

/// Clusters spans whose origins lie within `tolerance` vertically, top to bottom.
pub fn line_clusters(spans: &[TextSpan], tolerance: f32) -> Vec<LineCluster> {
    let mut clusters: Vec<(f32, Vec<Rect>)> = Vec::new();
    for span in spans {
        match clusters
            .iter_mut()
            .find(|(baseline, _)| (span.origin.y - *baseline).abs() <= tolerance)
        {
            Some((_, boxes)) => boxes.push(span.bbox),
            None => clusters.push((span.origin.y, vec![span.bbox])),
        }
    }
    let mut clusters: Vec<LineCluster> = clusters
        .into_iter()
        .filter_map(|(baseline, boxes)| {
            bounding_rect(boxes).map(|bbox| LineCluster { baseline, bbox })
        })
        .collect();
    clusters.sort_by(|a, b| a.baseline.total_cmp(&b.baseline));
    clusters
}

fn classify_line(block: &Rect, line: &Rect, single_line: bool, edge: f32) -> Alignment {
    let left = (line.x0 - block.x0).max(0.0);
    let right = (block.x1 - line.x1).max(0.0);
    match (left <= edge, right <= edge) {
        (true, true) if single_line => Alignment::Left,
        (true, true) => Alignment::Justify,
        (true, false) => Alignment::Left,
        (false, true) => Alignment::Right,
        (false, false) if (left - right).abs() <= edge => Alignment::Center,
        (false, false) => Alignment::Left,
    }
}

/// Majority vote over the line clusters of a block.
pub fn infer_alignment(block: &Rect, clusters: &[LineCluster], edge: f32) -> Alignment {
    let single_line = clusters.len() <= 1;
    let mut votes = [0usize; 4];
    for cluster in clusters {
        let vote = classify_line(block, &cluster.bbox, single_line, edge);
        if let Some(index) = ALIGNMENTS.iter().position(|candidate| *candidate == vote) {
            votes[index] += 1;
        }
    }
    let mut best = 0;
    for index in 1..ALIGNMENTS.len() {
        if votes[index] > votes[best] {
            best = index;
        }
    }
    ALIGNMENTS[best]
}
