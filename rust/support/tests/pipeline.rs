// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios for the support-generation pipeline.

use nalgebra::Point3;
use strut_core::{box_mesh, Part, TriangleMesh};
use strut_support::{
    BlockSupportGenerator, CoreTolerances, GridSupportGenerator, SupportConfig, SupportStructure,
    TrussConfig,
};

fn approx_generator() -> BlockSupportGenerator {
    BlockSupportGenerator::new(
        SupportConfig {
            use_approx_base_plate_support: true,
            ..SupportConfig::default()
        },
        CoreTolerances::default(),
    )
}

/// A plate on two legs with a 5 mm gap between leg tops and the plate
/// underside: the canonical self-intersecting support scenario.
fn table_part() -> Part {
    let mut mesh = box_mesh(Point3::new(0.0, 0.0, 8.0), Point3::new(20.0, 10.0, 10.0));
    mesh.merge(&box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 10.0, 3.0)));
    mesh.merge(&box_mesh(Point3::new(16.0, 0.0, 0.0), Point3::new(20.0, 10.0, 3.0)));
    Part::new("table", mesh)
}

#[test]
fn box_cantilever_yields_single_plate_support() {
    // 20 x 10 x 5 box floating at z = 10 on two thin pillars; the pillar
    // cross-section is too small to count as a self-intersection.
    let mut mesh = box_mesh(Point3::new(0.0, 0.0, 10.0), Point3::new(20.0, 10.0, 15.0));
    mesh.merge(&box_mesh(Point3::new(1.0, 4.5, 0.0), Point3::new(2.0, 5.5, 10.0)));
    mesh.merge(&box_mesh(Point3::new(18.0, 4.5, 0.0), Point3::new(19.0, 5.5, 10.0)));
    let part = Part::new("cantilever", mesh);

    let blocks = approx_generator().identify_support_regions(&part, 45.0, true);
    assert_eq!(blocks.len(), 1);

    let block = &blocks[0];
    assert!(!block.intersects_part);
    assert!(block.support_volume.is_watertight());
    assert!(block.support_volume.volume() > 0.0);

    // Footprint 19 x 9 after the outer edge gap, 10 mm tall.
    let expected = 19.0 * 9.0 * 10.0;
    let volume = block.support_volume.volume();
    assert!(
        (volume - expected).abs() < 0.06 * expected,
        "volume = {volume}"
    );

    let (min, max) = block.support_volume.bounds().unwrap();
    assert!(min.z.abs() < 1e-6);
    assert!(max.z < 10.2);
    // Shrunk footprint stays inside the overhang's XY shadow.
    assert!(min.x > 0.0 && max.x < 20.0);
    assert!(min.y > 0.0 && max.y < 10.0);
}

#[test]
fn table_splits_into_conformal_and_base_plate_columns() {
    let part = table_part();
    let generator = BlockSupportGenerator::new(SupportConfig::default(), CoreTolerances::default());

    let blocks = generator.identify_support_regions(&part, 45.0, true);
    assert!(blocks.len() >= 2, "blocks = {}", blocks.len());

    let conformal: Vec<_> = blocks.iter().filter(|b| b.intersects_part).collect();
    let base_plate: Vec<_> = blocks.iter().filter(|b| !b.intersects_part).collect();
    assert!(!conformal.is_empty(), "no conformal column found");
    assert!(!base_plate.is_empty(), "no base-plate column found");

    for block in &blocks {
        assert!(block.support_volume.volume() > 0.0);
        let (min, max) = block.support_volume.bounds().unwrap();
        // Every column hangs below the plate underside.
        assert!(max.z < 8.2, "column exceeds overhang: {max:?}");
        assert!(min.z > -0.1);
    }

    // Conformal columns rest on the leg tops at z = 3.
    for block in &conformal {
        let (min, _) = block.support_volume.bounds().unwrap();
        assert!(
            (min.z - 3.0).abs() < 0.2,
            "conformal column bottom at {}",
            min.z
        );
    }
    // Base-plate columns reach z = 0.
    for block in &base_plate {
        let (min, _) = block.support_volume.bounds().unwrap();
        assert!(min.z.abs() < 1e-6, "base column bottom at {}", min.z);
    }
}

#[test]
fn disabling_self_intersection_drops_intersecting_regions() {
    let part = table_part();
    let generator = BlockSupportGenerator::new(SupportConfig::default(), CoreTolerances::default());

    let blocks = generator.identify_support_regions(&part, 45.0, false);
    assert!(
        blocks.iter().all(|b| !b.intersects_part),
        "intersecting block emitted despite find_self_intersecting = false"
    );
}

#[test]
fn two_disjoint_overhangs_yield_two_blocks() {
    let mut mesh = box_mesh(Point3::new(0.0, 0.0, 10.0), Point3::new(10.0, 10.0, 12.0));
    mesh.merge(&box_mesh(Point3::new(30.0, 0.0, 6.0), Point3::new(40.0, 10.0, 8.0)));
    let part = Part::new("two-plates", mesh);

    let mut blocks = approx_generator().identify_support_regions(&part, 45.0, true);
    assert_eq!(blocks.len(), 2);
    blocks.sort_by(|a, b| {
        let ax = a.support_volume.bounds().unwrap().0.x;
        let bx = b.support_volume.bounds().unwrap().0.x;
        ax.partial_cmp(&bx).unwrap()
    });

    let first = blocks[0].support_volume.bounds().unwrap();
    let second = blocks[1].support_volume.bounds().unwrap();
    assert!(first.1.x < second.0.x, "XY bounding boxes overlap");
    assert!((first.1.z - 10.0).abs() < 0.2);
    assert!((second.1.z - 6.0).abs() < 0.2);
    assert!(blocks.iter().all(|b| !b.intersects_part));
}

#[test]
fn block_footprints_have_disjoint_interiors() {
    let part = table_part();
    let generator = BlockSupportGenerator::new(SupportConfig::default(), CoreTolerances::default());
    let blocks = generator.identify_support_regions(&part, 45.0, true);

    for (i, a) in blocks.iter().enumerate() {
        for b in blocks.iter().skip(i + 1) {
            let (amin, amax) = a.support_volume.bounds().unwrap();
            let (bmin, bmax) = b.support_volume.bounds().unwrap();
            let overlap_x = amax.x.min(bmax.x) - amin.x.max(bmin.x);
            let overlap_y = amax.y.min(bmax.y) - amin.y.max(bmin.y);
            // Columns may touch but never overlap by more than the edge
            // gaps.
            assert!(
                overlap_x < 0.5 || overlap_y < 0.5,
                "columns overlap: {overlap_x} x {overlap_y}"
            );
        }
    }
}

#[test]
fn grid_truss_support_materializes_geometry() {
    let mut mesh = box_mesh(Point3::new(0.0, 0.0, 10.0), Point3::new(12.0, 12.0, 14.0));
    mesh.merge(&box_mesh(Point3::new(5.0, 5.0, 0.0), Point3::new(6.0, 6.0, 10.0)));
    let part = Part::new("plate", mesh);

    let generator = GridSupportGenerator::new(
        SupportConfig {
            use_approx_base_plate_support: true,
            ..SupportConfig::default()
        },
        TrussConfig {
            use_upper_teeth: false,
            use_lower_teeth: false,
            support_wall_thickness: 0.0,
            num_skin_mesh_subdivide_iterations: 1,
            ..TrussConfig::default()
        },
        CoreTolerances::default(),
    );

    let grids = generator.identify_support_regions(&part, 45.0, true);
    assert_eq!(grids.len(), 1);

    let geometry = grids[0].geometry();
    assert!(!geometry.is_empty());

    // The truss stays inside the block's bounding box.
    let (bmin, bmax) = grids[0].block.support_volume.bounds().unwrap();
    let (gmin, gmax) = geometry.bounds().unwrap();
    assert!(gmin.x >= bmin.x - 1e-6 && gmax.x <= bmax.x + 1e-6);
    assert!(gmin.y >= bmin.y - 1e-6 && gmax.y <= bmax.y + 1e-6);
    assert!(gmin.z >= bmin.z - 1e-6 && gmax.z <= bmax.z + 1e-6);
}

#[test]
fn overhang_free_part_needs_no_support() {
    // A box resting directly on the plate: its only downward faces sit at
    // z = 0 and never grow a column.
    let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
    let part = Part::new("grounded", mesh);
    let blocks = approx_generator().identify_support_regions(&part, 45.0, true);
    assert!(blocks.is_empty(), "blocks = {}", blocks.len());
}

#[test]
fn degenerate_input_is_survivable() {
    // A single dangling triangle has no closed region outline anywhere.
    let mut sliver = TriangleMesh::new();
    let a = sliver.add_vertex(Point3::new(0.0, 0.0, 5.0));
    let b = sliver.add_vertex(Point3::new(1.0, 0.0, 5.0));
    let c = sliver.add_vertex(Point3::new(0.0, 1.0, 5.0));
    sliver.add_face(a, c, b);
    let part = Part::new("sliver", sliver);

    let blocks = approx_generator().identify_support_regions(&part, 45.0, true);
    assert!(blocks.is_empty());
}
