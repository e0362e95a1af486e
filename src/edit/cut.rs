//! Cut-to-insert
//!
//! Every cable crossed by a cut line gets a pass-through spliced into it. The
//! first one lands on the cut's midpoint, further ones are stacked below it.

use serde::Serialize;

use super::editor::PatchEditor;
use super::splice::SpliceReport;
use crate::canvas::{find_cut_hits, CutGesture, CutHit, Point, Segment};
use crate::error::Result;
use crate::patch::catalog;
use crate::patch::{Connection, LinkId, ModuleGraph, ModuleId};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CutReport {
    /// Links crossed, in order along the cut
    pub links: Vec<LinkId>,
    pub inserted: Vec<ModuleId>,
    pub failed: Vec<Connection>,
    /// Links where no module could be inserted
    pub skipped: Vec<LinkId>,
}

impl CutReport {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
    }
}

impl<G: ModuleGraph> PatchEditor<G> {
    /// Crossings of `cut` with the current cables, without editing anything
    pub fn cut_hits(&self, cut: &Segment) -> Vec<CutHit> {
        find_cut_hits(&self.registry, &self.geometry, &self.layout, cut, &self.config.cut)
    }

    /// Insert a pass-through into every cable the cut crosses.
    ///
    /// One snapshot covers the whole cut. A cut that crosses nothing leaves the
    /// patch and the history untouched.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn cut_links(&mut self, cut: Segment) -> Result<CutReport> {
        let hits = self.cut_hits(&cut);
        let mut report = CutReport::default();
        for hit in &hits {
            if !report.links.contains(&hit.link) {
                report.links.push(hit.link);
            }
        }
        if report.links.is_empty() {
            tracing::debug!("cut crossed no cables");
            return Ok(report);
        }

        let midpoint = cut.midpoint();
        let mut splice = SpliceReport::default();
        for (index, link) in report.links.clone().into_iter().enumerate() {
            let Some(connection) = self.registry.connection(link) else {
                report.skipped.push(link);
                continue;
            };
            let position = midpoint + Point::new(0.0, index as f32 * self.config.cut.stack_offset);
            match self.splice_into(catalog::PASSTHROUGH, connection, position, &mut splice) {
                Ok(id) => report.inserted.push(id),
                Err(e) => {
                    tracing::warn!(%link, error = %e, "could not insert pass-through on cut cable");
                    report.skipped.push(link);
                }
            }
        }
        report.failed = splice.failed;

        if report.inserted.is_empty() {
            return Ok(report);
        }
        tracing::info!(
            cables = report.links.len(),
            inserted = report.inserted.len(),
            points = ?hits.iter().map(|h| (h.point.x, h.point.y)).collect::<Vec<_>>(),
            "cut cables"
        );
        self.finish_edit(format!("Cut {} cables", report.inserted.len()))?;
        Ok(report)
    }

    /// Finish a cut gesture. A gesture that was never started does nothing.
    pub fn release_cut(&mut self, gesture: &mut CutGesture) -> Result<CutReport> {
        match gesture.release() {
            Some(cut) => self.cut_links(cut),
            None => Ok(CutReport::default()),
        }
    }
}
