//! Automatic column layout
//!
//! Places every module in a column by its distance from the graph's sources,
//! orders each column by where its predecessors sit, and stacks the columns
//! left to right. Cyclic patches are handled by capping how often a module can
//! be re-queued; placement inside a cycle is approximate but always finite.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::canvas::{Point, Size};
use crate::config::LayoutConfig;
use crate::patch::{Connection, ModuleId};

/// A module to place, with the footprint it occupies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutNode {
    pub id: ModuleId,
    pub size: Size,
}

impl LayoutNode {
    pub fn new(id: ModuleId, size: Size) -> Self {
        Self { id, size }
    }
}

/// Result of a layout pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutPlan {
    pub columns: BTreeMap<ModuleId, usize>,
    /// Modules of each column, top to bottom
    pub order: Vec<Vec<ModuleId>>,
    /// Top-left corner of each module
    pub positions: BTreeMap<ModuleId, Point>,
}

impl LayoutPlan {
    pub fn column(&self, id: ModuleId) -> Option<usize> {
        self.columns.get(&id).copied()
    }

    pub fn position(&self, id: ModuleId) -> Option<Point> {
        self.positions.get(&id).copied()
    }
}

struct Adjacency {
    successors: HashMap<ModuleId, Vec<ModuleId>>,
    predecessors: HashMap<ModuleId, Vec<ModuleId>>,
    in_degree: HashMap<ModuleId, usize>,
}

fn build_adjacency(ids: &BTreeSet<ModuleId>, connections: &[Connection]) -> Adjacency {
    let mut edges: BTreeSet<(ModuleId, ModuleId)> = BTreeSet::new();
    for c in connections {
        if c.src == c.dst || c.src.is_sink() {
            continue;
        }
        if ids.contains(&c.src) && ids.contains(&c.dst) {
            edges.insert((c.src, c.dst));
        }
    }

    let mut adjacency = Adjacency {
        successors: ids.iter().map(|id| (*id, Vec::new())).collect(),
        predecessors: ids.iter().map(|id| (*id, Vec::new())).collect(),
        in_degree: ids.iter().map(|id| (*id, 0)).collect(),
    };
    for (src, dst) in edges {
        adjacency.successors.entry(src).or_default().push(dst);
        adjacency.predecessors.entry(dst).or_default().push(src);
        *adjacency.in_degree.entry(dst).or_default() += 1;
    }
    adjacency
}

/// Assign a column to every module; the sink always ends up rightmost.
pub fn assign_columns(
    ids: &[ModuleId],
    connections: &[Connection],
    config: &LayoutConfig,
) -> BTreeMap<ModuleId, usize> {
    let mut all: BTreeSet<ModuleId> = ids.iter().copied().collect();
    all.insert(ModuleId::SINK);
    let adjacency = build_adjacency(&all, connections);
    let max_column = config.max_column.max(1);

    let mut columns: BTreeMap<ModuleId, usize> = BTreeMap::new();
    let mut visits: HashMap<ModuleId, u32> = HashMap::new();
    let mut queue: VecDeque<ModuleId> = VecDeque::new();

    for id in &all {
        if !id.is_sink() && adjacency.in_degree[id] == 0 {
            columns.insert(*id, 0);
            visits.insert(*id, 1);
            queue.push_back(*id);
        }
    }

    while let Some(current) = queue.pop_front() {
        let next_column = (columns[&current] + 1).min(max_column);
        for &succ in &adjacency.successors[&current] {
            if succ.is_sink() {
                continue;
            }
            let improved = columns.get(&succ).map_or(true, |&c| next_column > c);
            if !improved {
                continue;
            }
            columns.insert(succ, next_column);
            let seen = visits.entry(succ).or_insert(0);
            if *seen < config.max_visits {
                *seen += 1;
                queue.push_back(succ);
            }
        }
    }

    let highest = columns.values().copied().max().unwrap_or(0);
    let fallback = highest / 2;
    for id in &all {
        if !id.is_sink() && !columns.contains_key(id) {
            tracing::trace!(%id, column = fallback, "module unreachable from any source");
            columns.insert(*id, fallback);
        }
    }

    let sink_column = columns
        .iter()
        .filter(|(id, _)| !id.is_sink())
        .map(|(_, c)| c + 1)
        .max()
        .unwrap_or(0);
    columns.insert(ModuleId::SINK, sink_column);
    columns
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Order modules inside each column by the median row of their predecessors
fn order_columns(
    columns: &BTreeMap<ModuleId, usize>,
    predecessors: &HashMap<ModuleId, Vec<ModuleId>>,
) -> Vec<Vec<ModuleId>> {
    let count = columns.values().copied().max().map_or(0, |c| c + 1);
    let mut order: Vec<Vec<ModuleId>> = vec![Vec::new(); count];
    for (id, column) in columns {
        order[*column].push(*id);
    }

    let mut rows: HashMap<ModuleId, usize> = HashMap::new();
    for (column, members) in order.iter_mut().enumerate() {
        let mut keyed: Vec<(f64, ModuleId)> = members
            .iter()
            .map(|id| {
                let mut placed: Vec<f64> = predecessors
                    .get(id)
                    .into_iter()
                    .flatten()
                    .filter(|p| columns.get(p).map_or(false, |c| *c < column))
                    .filter_map(|p| rows.get(p).map(|r| *r as f64))
                    .collect();
                (median(&mut placed), *id)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        *members = keyed.into_iter().map(|(_, id)| id).collect();
        for (row, id) in members.iter().enumerate() {
            rows.insert(*id, row);
        }
    }
    order
}

/// Full layout pass: columns, ordering and coordinates
pub fn compute_layout(
    nodes: &[LayoutNode],
    connections: &[Connection],
    config: &LayoutConfig,
) -> LayoutPlan {
    let mut sizes: HashMap<ModuleId, Size> = nodes.iter().map(|n| (n.id, n.size)).collect();
    sizes.entry(ModuleId::SINK).or_insert(config.fallback_size);
    let ids: Vec<ModuleId> = sizes.keys().copied().collect();

    let columns = assign_columns(&ids, connections, config);
    let all: BTreeSet<ModuleId> = columns.keys().copied().collect();
    let adjacency = build_adjacency(&all, connections);
    let order = order_columns(&columns, &adjacency.predecessors);

    let size_of = |id: &ModuleId| sizes.get(id).copied().unwrap_or(config.fallback_size);
    let widths: Vec<f32> = order
        .iter()
        .map(|col| col.iter().map(|id| size_of(id).width).fold(0.0, f32::max))
        .collect();
    let heights: Vec<f32> = order
        .iter()
        .map(|col| {
            let stacked: f32 = col.iter().map(|id| size_of(id).height).sum();
            stacked + config.row_padding * col.len().saturating_sub(1) as f32
        })
        .collect();
    let tallest = heights.iter().copied().fold(0.0, f32::max);

    let mut positions = BTreeMap::new();
    let mut x = config.origin.x;
    for (column, members) in order.iter().enumerate() {
        if members.is_empty() {
            continue;
        }
        let mut y = config.origin.y + (tallest - heights[column]) / 2.0;
        for id in members {
            positions.insert(*id, Point::new(x, y));
            y += size_of(id).height + config.row_padding;
        }
        x += widths[column] + config.column_padding;
    }

    LayoutPlan {
        columns,
        order,
        positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn chain(n: u32) -> (Vec<ModuleId>, Vec<Connection>) {
        let ids: Vec<ModuleId> = (1..=n).map(ModuleId).collect();
        let connections = ids
            .windows(2)
            .map(|w| Connection::new(w[0], 0, w[1], 0))
            .collect();
        (ids, connections)
    }

    #[test]
    fn test_chain_gets_increasing_columns() {
        let (ids, connections) = chain(6);
        let columns = assign_columns(&ids, &connections, &LayoutConfig::default());
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(columns[id], i);
        }
        assert_eq!(columns[&ModuleId::SINK], 6);
    }

    #[test]
    fn test_two_cycle_terminates() {
        let ids = vec![ModuleId(1), ModuleId(2)];
        let connections = vec![
            Connection::new(ModuleId(1), 0, ModuleId(2), 0),
            Connection::new(ModuleId(2), 0, ModuleId(1), 0),
        ];
        let columns = assign_columns(&ids, &connections, &LayoutConfig::default());
        assert_eq!(columns.len(), 3);
        assert!(columns.values().all(|c| *c <= LayoutConfig::default().max_column + 1));
    }

    #[test]
    fn test_cycle_fed_by_source_is_bounded() {
        // 1 -> 2 <-> 3 -> sink
        let ids = vec![ModuleId(1), ModuleId(2), ModuleId(3)];
        let connections = vec![
            Connection::new(ModuleId(1), 0, ModuleId(2), 0),
            Connection::new(ModuleId(2), 0, ModuleId(3), 0),
            Connection::new(ModuleId(3), 0, ModuleId(2), 1),
            Connection::new(ModuleId(3), 0, ModuleId::SINK, 0),
        ];
        let config = LayoutConfig {
            max_visits: 3,
            ..Default::default()
        };
        let columns = assign_columns(&ids, &connections, &config);
        assert_eq!(columns[&ModuleId(1)], 0);
        assert!(columns[&ModuleId(2)] >= 1);
        assert!(columns[&ModuleId(3)] < 16);
        let others = columns[&ModuleId(2)].max(columns[&ModuleId(3)]);
        assert_eq!(columns[&ModuleId::SINK], others + 1);
    }

    #[test]
    fn test_column_cap() {
        let (ids, connections) = chain(10);
        let config = LayoutConfig {
            max_column: 3,
            ..Default::default()
        };
        let columns = assign_columns(&ids, &connections, &config);
        assert!(ids.iter().all(|id| columns[id] <= 3));
        assert_eq!(columns[&ModuleId::SINK], 4);
    }

    #[test]
    fn test_isolated_cycle_gets_mid_column() {
        let (mut ids, mut connections) = chain(5);
        ids.extend([ModuleId(10), ModuleId(11)]);
        connections.push(Connection::new(ModuleId(10), 0, ModuleId(11), 0));
        connections.push(Connection::new(ModuleId(11), 0, ModuleId(10), 0));

        let columns = assign_columns(&ids, &connections, &LayoutConfig::default());
        assert_eq!(columns[&ModuleId(10)], 2);
        assert_eq!(columns[&ModuleId(11)], 2);
    }

    #[test]
    fn test_barycentric_order_follows_predecessors() {
        // sources 1 and 2 in column 0; 4 is fed by 1, 3 is fed by 2.
        let ids = vec![ModuleId(1), ModuleId(2), ModuleId(3), ModuleId(4)];
        let connections = vec![
            Connection::new(ModuleId(2), 0, ModuleId(3), 0),
            Connection::new(ModuleId(1), 0, ModuleId(4), 0),
        ];
        let nodes: Vec<LayoutNode> = ids
            .iter()
            .map(|id| LayoutNode::new(*id, Size::new(100.0, 50.0)))
            .collect();
        let plan = compute_layout(&nodes, &connections, &LayoutConfig::default());

        assert_eq!(plan.order[0], vec![ModuleId(1), ModuleId(2)]);
        assert_eq!(plan.order[1], vec![ModuleId(4), ModuleId(3)]);
    }

    #[test]
    fn test_coordinates_stack_and_center() {
        let config = LayoutConfig {
            column_padding: 10.0,
            row_padding: 5.0,
            ..Default::default()
        };
        // column 0: 1 and 2 (heights 40 + 60), column 1: 3 (height 20)
        let nodes = vec![
            LayoutNode::new(ModuleId(1), Size::new(100.0, 40.0)),
            LayoutNode::new(ModuleId(2), Size::new(120.0, 60.0)),
            LayoutNode::new(ModuleId(3), Size::new(80.0, 20.0)),
            LayoutNode::new(ModuleId::SINK, Size::new(50.0, 20.0)),
        ];
        let connections = vec![
            Connection::new(ModuleId(1), 0, ModuleId(3), 0),
            Connection::new(ModuleId(2), 0, ModuleId(3), 1),
        ];
        let plan = compute_layout(&nodes, &connections, &config);

        let p1 = plan.position(ModuleId(1)).unwrap();
        let p2 = plan.position(ModuleId(2)).unwrap();
        let p3 = plan.position(ModuleId(3)).unwrap();
        let sink = plan.position(ModuleId::SINK).unwrap();

        // tallest column is column 0: 40 + 5 + 60 = 105
        assert_relative_eq!(p1.x, 0.0);
        assert_relative_eq!(p1.y, 0.0);
        assert_relative_eq!(p2.y, 45.0);
        // column 0 is 120 wide
        assert_relative_eq!(p3.x, 130.0);
        assert_relative_eq!(p3.y, (105.0 - 20.0) / 2.0);
        assert_relative_eq!(sink.x, 130.0 + 80.0 + 10.0);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let (ids, connections) = chain(4);
        let nodes: Vec<LayoutNode> = ids
            .iter()
            .map(|id| LayoutNode::new(*id, Size::new(100.0, 50.0)))
            .collect();
        let a = compute_layout(&nodes, &connections, &LayoutConfig::default());
        let b = compute_layout(&nodes, &connections, &LayoutConfig::default());
        assert_eq!(a, b);
    }
}
