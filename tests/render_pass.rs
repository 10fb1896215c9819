use approx::assert_relative_eq;
use tartan::{
    gfx::rendering::{EngineEvent, Topology},
    prelude::*,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_spinning_cube_scene() {
    init_logging();

    let scene = Scene::new();
    let camera = PerspectiveCamera::new(75.0, 1.77, 0.1, 1000.0).unwrap();
    let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
    let mut host = SurfaceRegistry::new();
    renderer.set_size(1920, 1080).unwrap();
    renderer.attach_to_host_surface(&mut host).unwrap();

    let cube = Mesh::new(
        box_geometry(2.0, 2.0, 2.0).unwrap(),
        Material::mesh_basic(MaterialParameters::new().color(0xff0000)),
    );
    scene.add_child(&cube).unwrap();
    camera.set_position(0.0, 0.0, 5.0);

    let info = renderer.render(&scene, &camera).unwrap();
    assert_eq!(info.calls, 1);
    assert_eq!(host.len(), 1);

    let draws = renderer.engine().last_frame_draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].node, cube.id());
    assert_eq!(draws[0].topology, Topology::Triangles);
    assert_eq!(draws[0].color, [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(draws[0].vertex_count, 36);
}

#[test]
fn test_projection_refresh_protocol() {
    let camera = PerspectiveCamera::new(50.0, 1.0, 0.1, 1000.0).unwrap();
    let original = camera.projection_matrix();

    camera.set_aspect(2.0).unwrap();
    assert_eq!(camera.projection().aspect, 2.0);
    assert_eq!(camera.projection_matrix(), original);
    assert!(camera.is_projection_stale());

    camera.update_projection_matrix();
    assert!(!camera.is_projection_stale());

    let expected = PerspectiveCamera::new(50.0, 2.0, 0.1, 1000.0)
        .unwrap()
        .projection_matrix();
    let updated = camera.projection_matrix();
    for c in 0..4 {
        for r in 0..4 {
            assert_relative_eq!(updated[c][r], expected[c][r], epsilon = 1e-6);
        }
    }
}

#[test]
fn test_attributes_upload_once_until_flagged() {
    init_logging();

    let positions = BufferAttribute::float32(vec![0.0; 300], 3).unwrap();
    let geometry = BufferGeometry::new();
    geometry.add_attribute("position", positions.clone());

    let scene = Scene::new();
    let cloud = Points::new(geometry, Material::points(MaterialParameters::new().size(2.0)));
    scene.add_child(&cloud).unwrap();

    let camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0).unwrap();
    let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();

    for frame in 0..5 {
        let values: Vec<f32> = (0..300).map(|i| (i + frame) as f32).collect();
        positions.set_array(values).unwrap();
        if frame % 2 == 0 {
            positions.set_needs_update(true);
        }
        renderer.render(&scene, &camera).unwrap();
        assert!(!positions.needs_update());
    }

    // Frames 0, 2 and 4 flagged the attribute
    assert_eq!(renderer.engine().uploads_of(positions.id()), 3);
    assert_eq!(renderer.info().frame, 5);
}

#[test]
fn test_shared_geometry_uploads_once_per_frame() {
    let geometry = box_geometry(1.0, 1.0, 1.0).unwrap();
    let material = Material::mesh_basic(MaterialParameters::new());
    let scene = Scene::new();
    for x in 0..3 {
        let mesh = Mesh::new(geometry.clone(), material.clone());
        mesh.set_position(x as f32 * 2.0, 0.0, 0.0);
        scene.add_child(&mesh).unwrap();
    }

    let camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0).unwrap();
    let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
    let info = renderer.render(&scene, &camera).unwrap();
    assert_eq!(info.calls, 3);
    assert_eq!(info.uploads, 1);

    // Editing the immediate geometry re-flags the flattened buffers
    geometry.push_vertex(vec3(0.0, 2.0, 0.0));
    geometry.set_vertices_need_update(true);
    let info = renderer.render(&scene, &camera).unwrap();
    assert_eq!(info.uploads, 1);
}

#[test]
fn test_child_draw_uses_world_matrix() {
    let scene = Scene::new();
    let pivot = Group::new();
    pivot.set_position(0.0, 3.0, 0.0);
    let mesh = Mesh::new(
        box_geometry(1.0, 1.0, 1.0).unwrap(),
        Material::mesh_basic(MaterialParameters::new()),
    );
    mesh.set_position(1.0, 0.0, 0.0);
    pivot.add_child(&mesh).unwrap();
    scene.add_child(&pivot).unwrap();

    let camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0).unwrap();
    let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
    renderer.render(&scene, &camera).unwrap();

    let draws = renderer.engine().last_frame_draws();
    let translation = draws[0].model.w;
    assert_relative_eq!(translation.x, 1.0);
    assert_relative_eq!(translation.y, 3.0);
}

#[test]
fn test_engine_error_aborts_render() {
    let scene = Scene::new();
    scene
        .add_child(&Mesh::new(
            box_geometry(1.0, 1.0, 1.0).unwrap(),
            Material::mesh_basic(MaterialParameters::new()),
        ))
        .unwrap();
    let camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0).unwrap();
    let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();

    renderer.engine_mut().fail_next("device lost");
    let err = renderer.render(&scene, &camera).unwrap_err();
    assert_eq!(err, TartanError::Engine("device lost".to_string()));
    assert_eq!(renderer.info().frame, 0);

    // The next frame succeeds
    assert_eq!(renderer.render(&scene, &camera).unwrap().calls, 1);
    assert!(renderer
        .engine()
        .events()
        .iter()
        .any(|event| matches!(event, EngineEvent::EndFrame)));
}

#[test]
fn test_failed_upload_leaves_flag_and_closes_frame() {
    init_logging();

    let positions = BufferAttribute::float32(vec![0.0; 30], 3).unwrap();
    let geometry = BufferGeometry::new();
    geometry.add_attribute("position", positions.clone());
    let scene = Scene::new();
    scene
        .add_child(&Points::new(geometry, Material::points(MaterialParameters::new())))
        .unwrap();
    let camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0).unwrap();
    let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
    renderer.render(&scene, &camera).unwrap();

    positions.set_array(vec![1.0; 30]).unwrap();
    positions.set_needs_update(true);
    renderer.engine_mut().fail_next_upload("out of memory");
    assert!(renderer.render(&scene, &camera).is_err());
    assert!(positions.needs_update());
    assert!(!renderer.engine().is_in_frame());
    assert_eq!(renderer.engine().events().last(), Some(&EngineEvent::AbortFrame));

    assert_eq!(renderer.render(&scene, &camera).unwrap().uploads, 1);
    assert_eq!(
        renderer.engine().resident_version(positions.id()),
        Some(positions.version())
    );
}

#[test]
fn test_replaced_attributes_do_not_accumulate() {
    let geometry = BufferGeometry::new();
    let scene = Scene::new();
    scene
        .add_child(&Line::new(geometry.clone(), Material::mesh_basic(MaterialParameters::new())))
        .unwrap();
    let camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0).unwrap();
    let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();

    let mut uploads = 0;
    for step in 0..100 {
        let values: Vec<f32> = (0..12).map(|i| (i * step) as f32).collect();
        geometry.add_attribute("position", BufferAttribute::float32(values, 3).unwrap());
        uploads += renderer.render(&scene, &camera).unwrap().uploads;
    }

    assert_eq!(uploads, 100);
    assert_eq!(renderer.engine().resident_count(), 1);
}
