//! Auto-layout as an edit

use super::editor::PatchEditor;
use crate::canvas::{compute_layout, LayoutNode, LayoutPlan};
use crate::error::Result;
use crate::patch::ModuleGraph;

impl<G: ModuleGraph> PatchEditor<G> {
    /// Lay out every module in columns and snapshot the result
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn auto_layout(&mut self) -> Result<LayoutPlan> {
        let nodes: Vec<LayoutNode> = self
            .graph
            .module_ids()
            .into_iter()
            .map(|id| LayoutNode::new(id, self.footprint(id)))
            .collect();
        let plan = compute_layout(&nodes, &self.graph.connections(), &self.config.layout);

        for (id, position) in &plan.positions {
            self.layout.set_position(*id, *position);
        }
        tracing::info!(
            modules = plan.positions.len(),
            columns = plan.order.len(),
            "auto layout"
        );
        self.finish_edit("Auto layout")?;
        Ok(plan)
    }
}
