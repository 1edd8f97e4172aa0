//! End-to-end assessments wiring the engine stages together.
//!
//! ```text
//! [tile lookup] -> probability grid -> threshold -> flood mask ─┐
//!                  bounds + field -> affine -> rasterize ───────┴─> aggregate
//! ```

use serde::Serialize;

use crate::affine::AffineTransform;
use crate::aggregate::aggregate;
use crate::capabilities::{FieldCatalog, SegmentationModel, TileData, TileSource};
use crate::config::CoverageConfig;
use crate::rasterize::rasterize;
use crate::threshold::threshold;
use crate::types::{
    BinaryMask, CoverageError, CoverageResult, FieldPolygon, GeoBounds, ProbabilityGrid, SarImage,
    TileRecord,
};

/// A field to clip the coverage to, and the extent of the raster it is
/// clipped against.
#[derive(Debug, Clone, Copy)]
pub struct FieldClip<'a> {
    /// The field boundary.
    pub field: &'a FieldPolygon,
    /// Geographic extent of the probability grid being assessed.
    pub bounds: GeoBounds,
}

/// Output of one assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    /// Flooded percentages and pixel counts.
    pub coverage: CoverageResult,
    /// The thresholded flood mask, for presentation layers to encode.
    pub flood_mask: BinaryMask,
}

/// Assess a probability grid, optionally clipped to a field.
///
/// # Errors
///
/// Returns [`CoverageError::InvalidConfig`] if `config` does not
/// validate. Rasterization and aggregation errors are propagated.
pub fn assess(
    grid: &ProbabilityGrid,
    config: &CoverageConfig,
    clip: Option<FieldClip<'_>>,
) -> Result<Assessment, CoverageError> {
    config.validate()?;
    assess_validated(grid, config, clip)
}

fn assess_validated(
    grid: &ProbabilityGrid,
    config: &CoverageConfig,
    clip: Option<FieldClip<'_>>,
) -> Result<Assessment, CoverageError> {
    let flood_mask = threshold(grid, config.threshold);

    let field_mask = clip
        .map(|clip| {
            let dimensions = grid.dimensions();
            let transform =
                AffineTransform::from_bounds(clip.bounds, dimensions.width, dimensions.height)?;
            Ok::<_, CoverageError>(rasterize(clip.field, &transform))
        })
        .transpose()?;

    let coverage = aggregate(&flood_mask, field_mask.as_ref())?;
    Ok(Assessment {
        coverage,
        flood_mask,
    })
}

/// Run `model` on `image`, then [`assess`] the resulting probabilities.
///
/// # Errors
///
/// Returns [`CoverageError::InvalidConfig`] before running the model if
/// `config` does not validate. Returns [`CoverageError::ShapeMismatch`]
/// if the model output does not have the image's dimensions. Model errors
/// and [`assess`] errors are propagated.
pub fn assess_image(
    image: &SarImage,
    model: &(impl SegmentationModel + ?Sized),
    config: &CoverageConfig,
    clip: Option<FieldClip<'_>>,
) -> Result<Assessment, CoverageError> {
    config.validate()?;
    assess_image_validated(image, model, config, clip)
}

fn assess_image_validated(
    image: &SarImage,
    model: &(impl SegmentationModel + ?Sized),
    config: &CoverageConfig,
    clip: Option<FieldClip<'_>>,
) -> Result<Assessment, CoverageError> {
    let grid = model.infer(image)?;
    if grid.dimensions() != image.dimensions() {
        return Err(CoverageError::ShapeMismatch {
            expected: image.dimensions(),
            actual: grid.dimensions(),
        });
    }
    assess_validated(&grid, config, clip)
}

/// A field assessed against the tile that covers it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAssessment {
    /// The assessed field.
    pub field_id: String,
    /// The catalog record of the tile used.
    pub tile: TileRecord,
    /// Extent reported by the tile source for the loaded raster.
    pub tile_bounds: GeoBounds,
    /// Coverage and flood mask for the tile.
    pub assessment: Assessment,
}

/// Outcome of [`assess_field`].
///
/// Only the first variant carries a coverage figure. The other two are
/// normal outcomes for which the caller decides what to report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FieldOutcome {
    /// A tile overlapped the field and was assessed.
    Assessed(Box<FieldAssessment>),
    /// No catalog tile overlaps the field's bounding box.
    NoOverlappingTile {
        /// The field's bounding box as `[south, west, north, east]`. It
        /// may have zero width or height.
        field_extent: [f64; 4],
    },
    /// The field geometry has no coordinates to search with.
    EmptyFootprint,
}

/// Look up a field, find the first catalog tile overlapping it, and
/// assess that tile clipped to the field.
///
/// Tiles holding raw SAR images are run through `model` first. A field
/// with zero area still selects the tiles its bounding box touches; the
/// tile is assessed and the in-field percentage comes back absent.
///
/// # Errors
///
/// Returns [`CoverageError::FieldNotFound`] if `fields` has no field
/// `field_id`. Returns [`CoverageError::Inference`] if the chosen tile
/// needs a model and none was supplied. Catalog, tile, model and
/// [`assess`] errors are propagated.
pub fn assess_field(
    field_id: &str,
    config: &CoverageConfig,
    fields: &(impl FieldCatalog + ?Sized),
    tiles: &(impl TileSource + ?Sized),
    model: Option<&dyn SegmentationModel>,
) -> Result<FieldOutcome, CoverageError> {
    config.validate()?;
    let field = fields
        .lookup_field(field_id)
        .ok_or_else(|| CoverageError::FieldNotFound(field_id.to_owned()))?;
    let Some(extent) = field.extent() else {
        return Ok(FieldOutcome::EmptyFootprint);
    };

    let index = config.tile_index.build(tiles.load_catalog()?);
    let Some(tile) = index.first_overlapping_extent(&extent).cloned() else {
        return Ok(FieldOutcome::NoOverlappingTile {
            field_extent: [extent.min().y, extent.min().x, extent.max().y, extent.max().x],
        });
    };

    let loaded = tiles.load_tile(&tile)?;
    let clip = Some(FieldClip {
        field: &field,
        bounds: loaded.bounds,
    });
    let assessment = match &loaded.data {
        TileData::Probabilities(grid) => assess_validated(grid, config, clip)?,
        TileData::Image(image) => {
            let model = model.ok_or_else(|| {
                CoverageError::Inference(format!(
                    "tile {} holds a SAR image but no segmentation model was supplied",
                    tile.data_reference
                ))
            })?;
            assess_image_validated(image, model, config, clip)?
        }
    };

    Ok(FieldOutcome::Assessed(Box::new(FieldAssessment {
        field_id: field.field_id().to_owned(),
        tile,
        tile_bounds: loaded.bounds,
        assessment,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;

    use geo::{MultiPolygon, polygon};

    use super::*;
    use crate::capabilities::LoadedTile;
    use crate::locate::TileIndexKind;
    use crate::types::Dimensions;

    fn bounds(s: f64, w: f64, n: f64, e: f64) -> GeoBounds {
        GeoBounds::new(s, w, n, e).unwrap()
    }

    fn square_field(id: &str, min: f64, max: f64) -> FieldPolygon {
        FieldPolygon::new(
            id,
            polygon![(x: min, y: min), (x: max, y: min), (x: max, y: max), (x: min, y: max)],
        )
    }

    fn uniform_grid(size: u32, value: f64) -> ProbabilityGrid {
        ProbabilityGrid::from_fn(Dimensions::new(size, size), |_, _| value).unwrap()
    }

    /// In-memory tile source that records which tiles were loaded.
    struct FakeTiles {
        catalog: Vec<TileRecord>,
        data: TileData,
        loaded: RefCell<Vec<String>>,
    }

    impl FakeTiles {
        fn new(catalog: Vec<TileRecord>, data: TileData) -> Self {
            Self {
                catalog,
                data,
                loaded: RefCell::new(Vec::new()),
            }
        }
    }

    impl TileSource for FakeTiles {
        fn load_catalog(&self) -> Result<Vec<TileRecord>, CoverageError> {
            Ok(self.catalog.clone())
        }

        fn load_tile(&self, record: &TileRecord) -> Result<LoadedTile, CoverageError> {
            self.loaded.borrow_mut().push(record.data_reference.clone());
            Ok(LoadedTile {
                data: self.data.clone(),
                bounds: record.bounds,
            })
        }
    }

    struct BrokenCatalog;

    impl TileSource for BrokenCatalog {
        fn load_catalog(&self) -> Result<Vec<TileRecord>, CoverageError> {
            Err(CoverageError::CatalogUnavailable("no manifests".to_owned()))
        }

        fn load_tile(&self, record: &TileRecord) -> Result<LoadedTile, CoverageError> {
            Err(CoverageError::TileUnavailable {
                reference: record.data_reference.clone(),
                reason: "unreachable".to_owned(),
            })
        }
    }

    // --- assess tests ---

    #[test]
    fn checkerboard_scenario() {
        let grid = ProbabilityGrid::from_fn(Dimensions::new(4, 4), |r, c| {
            if (r + c) % 2 == 0 { 0.9 } else { 0.1 }
        })
        .unwrap();
        let result = assess(&grid, &CoverageConfig::default(), None).unwrap();
        assert!((result.coverage.flooded_pct_whole - 50.0).abs() < f64::EPSILON);
        assert_eq!(result.coverage.flooded_pct_in_field, None);
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(result.flood_mask.get(r, c), Some((r + c) % 2 == 0));
            }
        }
    }

    #[test]
    fn clipped_square_scenario() {
        let field = square_field("F-1", 2.0, 8.0);
        let clip = FieldClip {
            field: &field,
            bounds: bounds(0.0, 0.0, 10.0, 10.0),
        };
        let result = assess(&uniform_grid(10, 0.9), &CoverageConfig::default(), Some(clip)).unwrap();
        assert_eq!(result.coverage.pixel_count_in_field, 36);
        assert_eq!(result.coverage.flooded_pct_in_field, Some(100.0));
        assert!((result.coverage.flooded_pct_whole - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn field_outside_raster_gives_absent_percentage() {
        let field = square_field("F-1", 20.0, 30.0);
        let clip = FieldClip {
            field: &field,
            bounds: bounds(0.0, 0.0, 10.0, 10.0),
        };
        let result = assess(&uniform_grid(10, 0.9), &CoverageConfig::default(), Some(clip)).unwrap();
        assert_eq!(result.coverage.flooded_pct_in_field, None);
        assert_eq!(result.coverage.pixel_count_in_field, 0);
    }

    #[test]
    fn threshold_comes_from_config() {
        let grid = uniform_grid(3, 0.6);
        let strict = CoverageConfig {
            threshold: 0.6,
            ..CoverageConfig::default()
        };
        let lenient = CoverageConfig {
            threshold: 0.59,
            ..CoverageConfig::default()
        };
        assert_eq!(assess(&grid, &strict, None).unwrap().flood_mask.count_true(), 0);
        assert_eq!(assess(&grid, &lenient, None).unwrap().flood_mask.count_true(), 9);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = CoverageConfig {
            threshold: f64::NAN,
            ..CoverageConfig::default()
        };
        assert!(matches!(
            assess(&uniform_grid(2, 0.9), &config, None),
            Err(CoverageError::InvalidConfig(_))
        ));
    }

    // --- assess_image tests ---

    #[test]
    fn image_is_segmented_then_assessed() {
        let image = SarImage::new(
            Dimensions::new(2, 2),
            vec![0.9, 0.1, 0.9, 0.1],
            vec![0.0; 4],
        )
        .unwrap();
        // Toy model: probability is the VV backscatter.
        let model = |image: &SarImage| {
            ProbabilityGrid::new(
                image.dimensions(),
                image.vv().iter().map(|&v| f64::from(v)).collect(),
            )
        };
        let result = assess_image(&image, &model, &CoverageConfig::default(), None).unwrap();
        assert_eq!(result.flood_mask.cells(), &[true, false, true, false]);
    }

    #[test]
    fn model_output_shape_is_checked() {
        let image = SarImage::new(Dimensions::new(2, 2), vec![0.0; 4], vec![0.0; 4]).unwrap();
        let model = |_: &SarImage| ProbabilityGrid::from_fn(Dimensions::new(3, 3), |_, _| 1.0);
        assert_eq!(
            assess_image(&image, &model, &CoverageConfig::default(), None).unwrap_err(),
            CoverageError::ShapeMismatch {
                expected: Dimensions::new(2, 2),
                actual: Dimensions::new(3, 3),
            }
        );
    }

    // --- assess_field tests ---

    fn assessed(outcome: FieldOutcome) -> Option<Box<FieldAssessment>> {
        match outcome {
            FieldOutcome::Assessed(assessed) => Some(assessed),
            FieldOutcome::NoOverlappingTile { .. } | FieldOutcome::EmptyFootprint => None,
        }
    }

    fn field_catalog() -> Vec<FieldPolygon> {
        vec![square_field("F-1", 1.25, 1.75), square_field("F-2", 8.0, 9.0)]
    }

    fn tile_catalog() -> Vec<TileRecord> {
        vec![
            TileRecord::new(bounds(5.0, 5.0, 6.0, 6.0), "far.png"),
            TileRecord::new(bounds(1.0, 1.0, 2.0, 2.0), "first.png"),
            TileRecord::new(bounds(0.0, 0.0, 3.0, 3.0), "second.png"),
        ]
    }

    #[test]
    fn first_overlapping_tile_is_assessed() {
        let tiles = FakeTiles::new(
            tile_catalog(),
            TileData::Probabilities(uniform_grid(4, 0.9)),
        );
        let outcome =
            assess_field("F-1", &CoverageConfig::default(), &field_catalog(), &tiles, None)
                .unwrap();
        let assessed = assessed(outcome).unwrap();
        assert_eq!(assessed.field_id, "F-1");
        assert_eq!(assessed.tile.data_reference, "first.png");
        assert_eq!(*tiles.loaded.borrow(), vec!["first.png".to_owned()]);
        // The field covers the central 2x2 block of the 4x4 tile.
        assert_eq!(assessed.assessment.coverage.pixel_count_in_field, 4);
        assert_eq!(assessed.assessment.coverage.flooded_pct_in_field, Some(100.0));
    }

    #[test]
    fn rtree_index_picks_the_same_tile() {
        let tiles = FakeTiles::new(
            tile_catalog(),
            TileData::Probabilities(uniform_grid(4, 0.9)),
        );
        let config = CoverageConfig {
            tile_index: TileIndexKind::RTree,
            ..CoverageConfig::default()
        };
        let outcome = assess_field("F-1", &config, &field_catalog(), &tiles, None).unwrap();
        let assessed = assessed(outcome).unwrap();
        assert_eq!(assessed.tile.data_reference, "first.png");
    }

    #[test]
    fn no_overlap_is_an_outcome_not_an_error() {
        let tiles = FakeTiles::new(
            tile_catalog(),
            TileData::Probabilities(uniform_grid(4, 0.9)),
        );
        let outcome =
            assess_field("F-2", &CoverageConfig::default(), &field_catalog(), &tiles, None)
                .unwrap();
        assert_eq!(
            outcome,
            FieldOutcome::NoOverlappingTile {
                field_extent: [8.0, 8.0, 9.0, 9.0],
            }
        );
        assert!(tiles.loaded.borrow().is_empty());
    }

    #[test]
    fn unknown_field_is_an_error() {
        let tiles = FakeTiles::new(
            tile_catalog(),
            TileData::Probabilities(uniform_grid(4, 0.9)),
        );
        assert_eq!(
            assess_field("F-9", &CoverageConfig::default(), &field_catalog(), &tiles, None)
                .unwrap_err(),
            CoverageError::FieldNotFound("F-9".to_owned())
        );
    }

    #[test]
    fn empty_geometry_has_no_footprint() {
        let fields = vec![FieldPolygon::new("F-0", MultiPolygon::<f64>::new(Vec::new()))];
        let tiles = FakeTiles::new(
            tile_catalog(),
            TileData::Probabilities(uniform_grid(4, 0.9)),
        );
        let outcome =
            assess_field("F-0", &CoverageConfig::default(), &fields, &tiles, None).unwrap();
        assert_eq!(outcome, FieldOutcome::EmptyFootprint);
    }

    #[test]
    fn line_shaped_field_is_assessed_without_in_field_share() {
        let fields = vec![FieldPolygon::new(
            "F-L",
            polygon![(x: 2.0, y: 5.0), (x: 8.0, y: 5.0), (x: 2.0, y: 5.0)],
        )];
        let tiles = FakeTiles::new(
            vec![TileRecord::new(bounds(0.0, 0.0, 10.0, 10.0), "t1.png")],
            TileData::Probabilities(
                ProbabilityGrid::from_fn(Dimensions::new(10, 10), |_, c| {
                    if c < 5 { 0.9 } else { 0.1 }
                })
                .unwrap(),
            ),
        );
        for kind in [TileIndexKind::Linear, TileIndexKind::RTree] {
            let config = CoverageConfig {
                tile_index: kind,
                ..CoverageConfig::default()
            };
            let outcome = assess_field("F-L", &config, &fields, &tiles, None).unwrap();
            let assessed = assessed(outcome).unwrap();
            let coverage = &assessed.assessment.coverage;
            assert_eq!(assessed.tile.data_reference, "t1.png");
            assert!((coverage.flooded_pct_whole - 50.0).abs() < f64::EPSILON);
            assert_eq!(coverage.flooded_pct_in_field, None);
            assert_eq!(coverage.pixel_count_in_field, 0);
        }
    }

    #[test]
    fn line_shaped_field_outside_catalog_reports_flat_extent() {
        let fields = vec![FieldPolygon::new(
            "F-L",
            polygon![(x: 20.0, y: 5.0), (x: 28.0, y: 5.0), (x: 20.0, y: 5.0)],
        )];
        let tiles = FakeTiles::new(
            tile_catalog(),
            TileData::Probabilities(uniform_grid(4, 0.9)),
        );
        let outcome =
            assess_field("F-L", &CoverageConfig::default(), &fields, &tiles, None).unwrap();
        assert_eq!(
            outcome,
            FieldOutcome::NoOverlappingTile {
                field_extent: [5.0, 20.0, 5.0, 28.0],
            }
        );
    }

    #[test]
    fn invalid_config_stops_before_inference() {
        let image = SarImage::new(Dimensions::new(2, 2), vec![0.0; 4], vec![0.0; 4]).unwrap();
        let calls = RefCell::new(0);
        let model = |image: &SarImage| {
            *calls.borrow_mut() += 1;
            ProbabilityGrid::from_fn(image.dimensions(), |_, _| 1.0)
        };
        let config = CoverageConfig {
            threshold: f64::INFINITY,
            ..CoverageConfig::default()
        };
        assert!(matches!(
            assess_image(&image, &model, &config, None),
            Err(CoverageError::InvalidConfig(_))
        ));
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn image_tile_without_model_fails() {
        let image = SarImage::new(Dimensions::new(4, 4), vec![0.5; 16], vec![0.5; 16]).unwrap();
        let tiles = FakeTiles::new(tile_catalog(), TileData::Image(image));
        assert!(matches!(
            assess_field("F-1", &CoverageConfig::default(), &field_catalog(), &tiles, None),
            Err(CoverageError::Inference(_))
        ));
    }

    #[test]
    fn image_tile_runs_through_model() {
        let image = SarImage::new(Dimensions::new(4, 4), vec![0.5; 16], vec![0.5; 16]).unwrap();
        let tiles = FakeTiles::new(tile_catalog(), TileData::Image(image));
        let model = |image: &SarImage| ProbabilityGrid::from_fn(image.dimensions(), |_, _| 0.0);
        let outcome = assess_field(
            "F-1",
            &CoverageConfig::default(),
            &field_catalog(),
            &tiles,
            Some(&model),
        )
        .unwrap();
        let assessed = assessed(outcome).unwrap();
        assert_eq!(assessed.assessment.coverage.flooded_pct_in_field, Some(0.0));
    }

    #[test]
    fn catalog_failure_propagates() {
        assert_eq!(
            assess_field(
                "F-1",
                &CoverageConfig::default(),
                &field_catalog(),
                &BrokenCatalog,
                None
            )
            .unwrap_err(),
            CoverageError::CatalogUnavailable("no manifests".to_owned())
        );
    }
}
