//! Tile discovery: which pre-generated tiles overlap a field.
//!
//! Overlap is the closed-interval rectangle test of
//! [`GeoBounds::overlaps`]: tiles that only touch the field along an edge
//! or at a corner still count. Matches are always reported in catalog
//! order, whichever index produced them. No overlap is a normal outcome
//! and is reported as an empty result.
//!
//! Searches accept either validated [`GeoBounds`] or a raw `geo::Rect`,
//! which may be flat: a field traced as a line still has a location and
//! still selects the tiles it touches.

use geo::Rect;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};

use crate::types::{GeoBounds, TileRecord};

/// Whether two rectangles share at least one point. Symmetric.
#[must_use]
pub fn overlaps(a: &GeoBounds, b: &GeoBounds) -> bool {
    a.overlaps(b)
}

/// Lazily scan `catalog` for tiles overlapping `field_bounds`, in
/// catalog order.
///
/// Callers that only need one tile can take the first item without
/// scanning the rest of the catalog.
pub fn find_overlapping(
    field_bounds: GeoBounds,
    catalog: &[TileRecord],
) -> impl Iterator<Item = &TileRecord> {
    catalog
        .iter()
        .filter(move |record| record.bounds.overlaps(&field_bounds))
}

/// Lazily scan `catalog` for tiles meeting `extent`, in catalog order.
///
/// `extent` may have zero width or height.
pub fn find_overlapping_extent(
    extent: Rect<f64>,
    catalog: &[TileRecord],
) -> impl Iterator<Item = &TileRecord> {
    catalog
        .iter()
        .filter(move |record| record.bounds.overlaps_rect(&extent))
}

/// A searchable tile catalog.
pub trait TileIndex {
    /// All records in the index, in catalog order.
    fn records(&self) -> &[TileRecord];

    /// Every tile meeting `extent`, in catalog order. `extent` may have
    /// zero width or height.
    fn overlapping_extent(&self, extent: &Rect<f64>) -> Vec<&TileRecord>;

    /// The first tile, in catalog order, meeting `extent`.
    fn first_overlapping_extent(&self, extent: &Rect<f64>) -> Option<&TileRecord> {
        self.overlapping_extent(extent).into_iter().next()
    }

    /// Every tile overlapping `field_bounds`, in catalog order.
    fn overlapping(&self, field_bounds: &GeoBounds) -> Vec<&TileRecord> {
        self.overlapping_extent(&field_bounds.to_rect())
    }

    /// The first tile, in catalog order, overlapping `field_bounds`.
    fn first_overlapping(&self, field_bounds: &GeoBounds) -> Option<&TileRecord> {
        self.first_overlapping_extent(&field_bounds.to_rect())
    }
}

/// Selects which [`TileIndex`] implementation searches the catalog.
///
/// Both kinds return identical results; they differ only in cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileIndexKind {
    /// Flat scan, see [`LinearIndex`].
    #[default]
    Linear,
    /// R*-tree, see [`RTreeIndex`].
    RTree,
}

impl TileIndexKind {
    /// Build an index of this kind over `records`.
    #[must_use]
    pub fn build(self, records: Vec<TileRecord>) -> Box<dyn TileIndex> {
        match self {
            Self::Linear => Box::new(LinearIndex::new(records)),
            Self::RTree => Box::new(RTreeIndex::new(records)),
        }
    }
}

// ──────────────────────────── Linear scan ─────────────────────────────

/// Flat scan over the catalog. Adequate for the few hundred tiles a
/// regional manifest holds.
#[derive(Debug, Clone, Default)]
pub struct LinearIndex {
    records: Vec<TileRecord>,
}

impl LinearIndex {
    /// Wrap a catalog.
    #[must_use]
    pub const fn new(records: Vec<TileRecord>) -> Self {
        Self { records }
    }
}

impl TileIndex for LinearIndex {
    fn records(&self) -> &[TileRecord] {
        &self.records
    }

    fn overlapping_extent(&self, extent: &Rect<f64>) -> Vec<&TileRecord> {
        find_overlapping_extent(*extent, &self.records).collect()
    }

    fn first_overlapping_extent(&self, extent: &Rect<f64>) -> Option<&TileRecord> {
        find_overlapping_extent(*extent, &self.records).next()
    }
}

// ────────────────────────────── R*-tree ───────────────────────────────

/// Tile envelope tagged with its catalog position.
type IndexedTile = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn envelope(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// R*-tree over tile envelopes for large catalogs.
///
/// Returns exactly what [`LinearIndex`] returns for the same catalog,
/// including order.
#[derive(Debug, Clone)]
pub struct RTreeIndex {
    records: Vec<TileRecord>,
    tree: RTree<IndexedTile>,
}

impl RTreeIndex {
    /// Bulk-load an index over `records`.
    #[must_use]
    pub fn new(records: Vec<TileRecord>) -> Self {
        let tiles: Vec<IndexedTile> = records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                GeomWithData::new(Rectangle::from_aabb(envelope(&record.bounds.to_rect())), position)
            })
            .collect();
        Self {
            records,
            tree: RTree::bulk_load(tiles),
        }
    }

    fn hits(&self, extent: &Rect<f64>) -> impl Iterator<Item = usize> {
        self.tree
            .locate_in_envelope_intersecting(&envelope(extent))
            .map(|tile| tile.data)
    }
}

impl TileIndex for RTreeIndex {
    fn records(&self) -> &[TileRecord] {
        &self.records
    }

    fn overlapping_extent(&self, extent: &Rect<f64>) -> Vec<&TileRecord> {
        let mut positions: Vec<usize> = self.hits(extent).collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .filter_map(|position| self.records.get(position))
            .collect()
    }

    fn first_overlapping_extent(&self, extent: &Rect<f64>) -> Option<&TileRecord> {
        self.hits(extent)
            .min()
            .and_then(|position| self.records.get(position))
    }
}
