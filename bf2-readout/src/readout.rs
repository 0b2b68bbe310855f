use bf2::collision::CollisionMesh;
use bf2::mesh::{AnyVisibleMesh, MeshKind, VisibleMesh};

pub fn visible(mesh: &AnyVisibleMesh) {
    match mesh {
        AnyVisibleMesh::Static(m) => visible_mesh(m),
        AnyVisibleMesh::Bundled(m) => visible_mesh(m),
        AnyVisibleMesh::Skinned(m) => visible_mesh(m),
    }
}

fn visible_mesh<K: MeshKind>(mesh: &VisibleMesh<K>) {
    log::info!("{:?}", mesh.header);
    log::info!(
        "{} version {}: {} geoms, {} vertices, {} faces",
        K::NAME,
        mesh.version(),
        mesh.geoms.len(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    for attr in mesh.attributes.iter().filter(|a| a.used) {
        log::info!("  {:?} {:?} at {}", attr.usage, attr.decl_type, attr.offset);
    }
    for (g, geom) in mesh.geoms.iter().enumerate() {
        for (l, lod) in geom.lods.iter().enumerate() {
            log::info!(
                "geom {g} lod {l}: {} materials, bounds {} .. {}",
                lod.materials.len(),
                lod.bounds.min,
                lod.bounds.max
            );
            log::debug!("  {:?}", lod.extra);
            for material in &lod.materials {
                log::info!(
                    "  {} [{}]: {} vertices, {} faces",
                    material.fx_file,
                    material.technique,
                    material.vertices.len(),
                    material.faces.len()
                );
                for map in &material.maps {
                    log::info!("    {map}");
                }
            }
        }
    }
}

pub fn collision(mesh: &CollisionMesh) {
    log::info!(
        "collisionmesh version {}.{}: {} geoms",
        mesh.version.major,
        mesh.version.minor,
        mesh.geoms.len()
    );
    for (g, geom) in mesh.geoms.iter().enumerate() {
        for (s, sub_geom) in geom.sub_geoms.iter().enumerate() {
            for (l, lod) in sub_geom.lods.iter().enumerate() {
                log::info!(
                    "geom {g} sub {s} lod {l}: {:?}, {} faces, {} vertices, bounds {} .. {}",
                    lod.col_type,
                    lod.faces.len(),
                    lod.vertices.len(),
                    lod.bounds.min,
                    lod.bounds.max
                );
                match &lod.bsp {
                    Some(bsp) => log::info!(
                        "  bsp: {} nodes, {} leaves, {} face refs, depth {}",
                        bsp.nodes.len(),
                        bsp.leaves().count(),
                        bsp.face_ref_count(),
                        bsp.depth()
                    ),
                    None => log::info!("  no bsp"),
                }
                if let Some(debug) = &lod.debug_mesh {
                    log::info!("  {} debug face indices", debug.len());
                }
            }
        }
    }
}
