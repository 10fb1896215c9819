use std::collections::HashMap;

use super::{
    engine::{
        AttributeBinding, AttributeUpload, DrawSubmission, FrameSetup, RenderEngine, Topology,
    },
    surface::{scale, DrawableSurface, HostSurface},
};
use crate::{
    config::RendererConfig,
    error::{Result, TartanError},
    gfx::{
        camera::PerspectiveCamera,
        geometry::{
            buffer::WeakAttribute, AttributeId, BufferAttribute, BufferGeometry, FlattenMode,
        },
        material::MaterialKind,
        scene::{NodeType, Object3D},
    },
};

/// Counters from the most recent render pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Completed frames since the renderer was created
    pub frame: u64,
    /// Draw calls submitted
    pub calls: usize,
    /// Vertices submitted across all draws
    pub vertices: usize,
    /// Attribute uploads performed
    pub uploads: usize,
    /// Device copies freed because their attribute was dropped
    pub released: usize,
    /// Renderable nodes that produced no draw
    pub skipped: usize,
}

/// Draws a scene tree through a [`RenderEngine`]
///
/// The renderer owns one drawable surface, created at the configured default
/// size (300x150 unless configured otherwise). It is not visible anywhere
/// until [`attach_to_host_surface`](Renderer::attach_to_host_surface) is
/// called.
///
/// ```rust
/// use tartan::gfx::camera::PerspectiveCamera;
/// use tartan::gfx::rendering::{RecordingEngine, Renderer, SurfaceRegistry};
/// use tartan::gfx::scene::Scene;
///
/// let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
/// let mut host = SurfaceRegistry::new();
/// renderer.set_size(640, 480).unwrap();
/// renderer.attach_to_host_surface(&mut host).unwrap();
///
/// let scene = Scene::new();
/// let camera = PerspectiveCamera::new(75.0, 640.0 / 480.0, 0.1, 1000.0).unwrap();
/// let info = renderer.render(&scene, &camera).unwrap();
/// assert_eq!(info.calls, 0);
/// ```
pub struct Renderer<E: RenderEngine> {
    engine: E,
    config: RendererConfig,
    surface: DrawableSurface,
    attachments: usize,
    info: RenderInfo,
    uploaded: HashMap<AttributeId, WeakAttribute>,
}

impl<E: RenderEngine> Renderer<E> {
    pub fn new(engine: E) -> Result<Self> {
        Self::with_config(engine, RendererConfig::default())
    }

    pub fn with_config(mut engine: E, config: RendererConfig) -> Result<Self> {
        let (width, height) = (config.default_width, config.default_height);
        if width == 0 || height == 0 {
            return Err(TartanError::invalid(format!(
                "default surface size must be positive, got {}x{}",
                width, height
            )));
        }

        let pixel_ratio = config.pixel_ratio;
        let id = engine.create_surface(scale(width, pixel_ratio), scale(height, pixel_ratio))?;
        log::debug!("Created drawable surface {:?} ({}x{})", id, width, height);

        Ok(Self {
            engine,
            config,
            surface: DrawableSurface {
                id,
                width,
                height,
                pixel_ratio,
            },
            attachments: 0,
            info: RenderInfo::default(),
            uploaded: HashMap::new(),
        })
    }

    /// Resize the drawable surface in logical pixels
    ///
    /// The camera aspect ratio is not touched; update it and call
    /// `update_projection_matrix` separately.
    pub fn set_size(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(TartanError::invalid(format!(
                "surface size must be positive, got {}x{}",
                width, height
            )));
        }

        let ratio = self.surface.pixel_ratio;
        self.engine
            .resize_surface(self.surface.id, scale(width, ratio), scale(height, ratio))?;
        self.surface.width = width;
        self.surface.height = height;
        log::debug!("Resized surface {:?} to {}x{}", self.surface.id, width, height);
        Ok(())
    }

    pub fn set_pixel_ratio(&mut self, ratio: f32) -> Result<()> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(TartanError::invalid(format!(
                "pixel ratio must be positive, got {}",
                ratio
            )));
        }

        let (width, height) = (self.surface.width, self.surface.height);
        self.engine
            .resize_surface(self.surface.id, scale(width, ratio), scale(height, ratio))?;
        self.surface.pixel_ratio = ratio;
        Ok(())
    }

    /// Append the drawable surface to a host
    ///
    /// Each call appends again; attaching twice shows the surface twice.
    pub fn attach_to_host_surface(&mut self, host: &mut impl HostSurface) -> Result<()> {
        if self.attachments > 0 {
            log::warn!(
                "Surface {:?} is already attached {} time(s); attaching again",
                self.surface.id,
                self.attachments
            );
        }
        host.append(&self.surface)?;
        self.attachments += 1;
        Ok(())
    }

    /// Free the engine copies of attributes the application has dropped
    ///
    /// Runs at the start of every render; returns the number released.
    pub fn release_dropped_attributes(&mut self) -> usize {
        let dropped: Vec<AttributeId> = self
            .uploaded
            .iter()
            .filter(|(_, weak)| !weak.is_alive())
            .map(|(id, _)| *id)
            .collect();

        for id in &dropped {
            self.uploaded.remove(id);
            self.engine.release_attribute(*id);
        }
        if !dropped.is_empty() {
            log::debug!("Released {} dropped attribute(s)", dropped.len());
        }
        dropped.len()
    }

    /// Render one frame of the subtree rooted at `scene`
    ///
    /// Uses the camera's cached projection matrix as-is, even when it is
    /// stale. If the engine fails after the frame has begun, the frame is
    /// aborted before the error is returned.
    pub fn render(
        &mut self,
        scene: &impl AsRef<Object3D>,
        camera: &PerspectiveCamera,
    ) -> Result<RenderInfo> {
        if camera.is_projection_stale() && self.config.warn_on_stale_projection {
            log::warn!(
                "Rendering with a stale projection matrix; call update_projection_matrix after changing camera parameters"
            );
        }

        let mut drawables = Vec::new();
        collect_visible(scene.as_ref(), &mut drawables);

        let mut info = RenderInfo {
            frame: self.info.frame,
            released: self.release_dropped_attributes(),
            ..RenderInfo::default()
        };

        self.engine.begin_frame(&FrameSetup {
            surface: self.surface.id,
            clear_color: self.config.clear_color,
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
        })?;

        let result = self
            .draw_frame(&drawables, &mut info)
            .and_then(|()| self.engine.end_frame());
        if let Err(err) = result {
            self.engine.abort_frame();
            return Err(err);
        }

        info.frame += 1;
        self.info = info;
        Ok(info)
    }

    /// Submit every drawable node of a begun frame
    fn draw_frame(&mut self, drawables: &[Object3D], info: &mut RenderInfo) -> Result<()> {
        for node in drawables {
            match self.draw_node(node, info)? {
                Some(submission) => {
                    log::trace!(
                        "Draw {:?}: {:?}, {} vertices",
                        submission.node,
                        submission.topology,
                        submission.vertex_count
                    );
                    self.engine.draw(&submission)?;
                    info.calls += 1;
                    info.vertices += submission.vertex_count as usize;
                }
                None => info.skipped += 1,
            }
        }
        Ok(())
    }

    /// Sync a node's attributes and build its draw, if it has anything to draw
    fn draw_node(&mut self, node: &Object3D, info: &mut RenderInfo) -> Result<Option<DrawSubmission>> {
        let Some(renderable) = node.renderable() else {
            return Ok(None);
        };

        let (topology, mode) = match node.node_type() {
            NodeType::Points => (Topology::Points, FlattenMode::Vertices),
            NodeType::Line => (Topology::LineStrip, FlattenMode::Vertices),
            _ => (Topology::Triangles, FlattenMode::Faces),
        };

        let geometry = renderable.geometry.resolve(mode)?;
        let Some(position) = geometry.attribute("position") else {
            log::warn!("Skipping {:?}: geometry has no position attribute", node);
            return Ok(None);
        };
        if position.item_size() != 3 {
            log::warn!(
                "Skipping {:?}: position item size is {}, expected 3",
                node,
                position.item_size()
            );
            return Ok(None);
        }

        info.uploads += self.sync_attributes(&geometry)?;

        let material = &renderable.material;
        if topology == Topology::Points && material.kind() != MaterialKind::Points {
            log::debug!("{:?} drawn as points with a {:?} material", node, material.kind());
        }

        let attributes = geometry
            .attributes()
            .into_iter()
            .map(|(name, attribute)| AttributeBinding {
                name,
                id: attribute.id(),
                item_size: attribute.item_size(),
            })
            .collect();

        Ok(Some(DrawSubmission {
            node: node.id(),
            topology,
            model: node.world_matrix(),
            attributes,
            vertex_count: vertex_count(&position)?,
            color: material.rgba(),
            point_size: material.size(),
            vertex_colors: material.vertex_colors(),
        }))
    }

    /// Upload new and dirty attributes, returning the number uploaded
    fn sync_attributes(&mut self, geometry: &BufferGeometry) -> Result<usize> {
        let mut uploads = 0;
        for (name, attribute) in geometry.attributes() {
            let resident = self.engine.is_resident(attribute.id());
            if resident && !attribute.needs_update() {
                continue;
            }

            {
                let data = attribute.array();
                self.engine.upload_attribute(&AttributeUpload {
                    id: attribute.id(),
                    name: &name,
                    version: attribute.version(),
                    item_size: attribute.item_size(),
                    data: &data,
                })?;
            }
            attribute.clear_needs_update();
            self.uploaded
                .entry(attribute.id())
                .or_insert_with(|| attribute.downgrade());
            uploads += 1;
        }
        Ok(uploads)
    }

    /// Counters from the most recent render
    pub fn info(&self) -> RenderInfo {
        self.info
    }

    pub fn surface(&self) -> &DrawableSurface {
        &self.surface
    }

    /// Number of times the surface has been attached to a host
    pub fn attachments(&self) -> usize {
        self.attachments
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

/// Item count of a position attribute as a draw vertex count
fn vertex_count(position: &BufferAttribute) -> Result<u32> {
    checked_vertex_count(position.count())
}

fn checked_vertex_count(count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| {
        TartanError::invalid(format!(
            "position attribute has {} vertices, at most {} can be drawn",
            count,
            u32::MAX
        ))
    })
}

/// Depth-first pre-order walk that prunes invisible subtrees
fn collect_visible(node: &Object3D, out: &mut Vec<Object3D>) {
    if !node.is_visible() {
        return;
    }
    if node.node_type().is_renderable() {
        out.push(node.clone());
    }
    for child in node.children() {
        collect_visible(&child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        geometry::{box_geometry, BufferAttribute},
        material::{Material, MaterialParameters},
        rendering::{recording::EngineEvent, RecordingEngine, SurfaceRegistry},
        scene::{Group, Line, Mesh, Points, Scene},
    };

    fn camera() -> PerspectiveCamera {
        let camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0).unwrap();
        camera.set_position(0.0, 0.0, 5.0);
        camera
    }

    fn basic() -> Material {
        Material::mesh_basic(MaterialParameters::new().color(0x00ff00))
    }

    #[test]
    fn test_default_surface_size() {
        let renderer = Renderer::new(RecordingEngine::new()).unwrap();
        assert_eq!(renderer.surface().width(), 300);
        assert_eq!(renderer.surface().height(), 150);
        assert_eq!(
            renderer.engine().events()[0],
            EngineEvent::SurfaceCreated {
                surface: renderer.surface().id(),
                width: 300,
                height: 150,
            }
        );
    }

    #[test]
    fn test_set_size_validation() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        assert!(matches!(
            renderer.set_size(0, 100),
            Err(TartanError::InvalidArgument(_))
        ));
        assert_eq!(renderer.surface().width(), 300);

        renderer.set_pixel_ratio(2.0).unwrap();
        renderer.set_size(320, 240).unwrap();
        let id = renderer.surface().id();
        assert_eq!(renderer.engine().surface_size(id), Some((640, 480)));
    }

    #[test]
    fn test_engine_failure_propagates() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        renderer.engine_mut().fail_next("out of memory");
        assert_eq!(
            renderer.set_size(10, 10),
            Err(TartanError::Engine("out of memory".to_string()))
        );
        assert_eq!(renderer.surface().width(), 300);
    }

    #[test]
    fn test_double_attach() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let mut host = SurfaceRegistry::new();
        renderer.attach_to_host_surface(&mut host).unwrap();
        renderer.attach_to_host_surface(&mut host).unwrap();
        assert_eq!(host.len(), 2);
        assert_eq!(renderer.attachments(), 2);
    }

    #[test]
    fn test_topology_per_node_type() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let scene = Scene::new();
        let cube = box_geometry(1.0, 1.0, 1.0).unwrap();
        scene.add_child(&Mesh::new(cube.clone(), basic())).unwrap();
        scene.add_child(&Line::new(cube.clone(), basic())).unwrap();
        scene
            .add_child(&Points::new(cube, Material::points(MaterialParameters::new())))
            .unwrap();

        let info = renderer.render(&scene, &camera()).unwrap();
        assert_eq!(info.calls, 3);

        let draws = renderer.engine().last_frame_draws();
        assert_eq!(draws[0].topology, Topology::Triangles);
        assert_eq!(draws[0].vertex_count, 36);
        assert_eq!(draws[1].topology, Topology::LineStrip);
        assert_eq!(draws[1].vertex_count, 24);
        assert_eq!(draws[2].topology, Topology::Points);
        assert_eq!(info.vertices, 36 + 24 + 24);
    }

    #[test]
    fn test_invisible_subtree_is_skipped() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let scene = Scene::new();
        let group = Group::new();
        group
            .add_child(&Mesh::new(box_geometry(1.0, 1.0, 1.0).unwrap(), basic()))
            .unwrap();
        scene.add_child(&group).unwrap();
        group.set_visible(false);

        assert_eq!(renderer.render(&scene, &camera()).unwrap().calls, 0);
        group.set_visible(true);
        assert_eq!(renderer.render(&scene, &camera()).unwrap().calls, 1);
    }

    #[test]
    fn test_missing_position_is_skipped() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let scene = Scene::new();
        let geometry = BufferGeometry::new();
        geometry.add_attribute("color", BufferAttribute::float32(vec![1.0; 9], 3).unwrap());
        scene.add_child(&Points::new(geometry, basic())).unwrap();

        let info = renderer.render(&scene, &camera()).unwrap();
        assert_eq!(info.calls, 0);
        assert_eq!(info.skipped, 1);
        assert_eq!(info.uploads, 0);
    }

    #[test]
    fn test_dirty_attribute_upload_cycle() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let scene = Scene::new();
        let positions = BufferAttribute::float32(vec![0.0; 30], 3).unwrap();
        let geometry = BufferGeometry::new();
        geometry.add_attribute("position", positions.clone());
        scene
            .add_child(&Points::new(geometry, Material::points(MaterialParameters::new())))
            .unwrap();
        let camera = camera();

        assert_eq!(renderer.render(&scene, &camera).unwrap().uploads, 1);
        assert_eq!(renderer.render(&scene, &camera).unwrap().uploads, 0);

        // Rewriting without flagging does not upload
        positions.set_array(vec![1.0; 30]).unwrap();
        assert_eq!(renderer.render(&scene, &camera).unwrap().uploads, 0);

        positions.set_needs_update(true);
        assert_eq!(renderer.render(&scene, &camera).unwrap().uploads, 1);
        assert!(!positions.needs_update());
        assert_eq!(
            renderer.engine().resident_version(positions.id()),
            Some(positions.version())
        );
        assert_eq!(renderer.engine().uploads_of(positions.id()), 2);
    }

    #[test]
    fn test_stale_projection_used_as_is() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let scene = Scene::new();
        let camera = camera();
        let before = camera.projection_matrix();
        camera.set_aspect(2.0).unwrap();

        renderer.render(&scene, &camera).unwrap();
        let setup = renderer
            .engine()
            .events()
            .iter()
            .find_map(|event| match event {
                EngineEvent::BeginFrame(setup) => Some(setup.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(setup.projection, before);
    }

    #[test]
    fn test_failed_upload_aborts_frame() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let scene = Scene::new();
        let positions = BufferAttribute::float32(vec![0.0; 9], 3).unwrap();
        let geometry = BufferGeometry::new();
        geometry.add_attribute("position", positions.clone());
        scene.add_child(&Mesh::new(geometry, basic())).unwrap();
        let camera = camera();
        renderer.render(&scene, &camera).unwrap();

        positions.set_needs_update(true);
        renderer.engine_mut().fail_next_upload("out of memory");
        assert_eq!(
            renderer.render(&scene, &camera),
            Err(TartanError::Engine("out of memory".to_string()))
        );
        assert!(positions.needs_update());
        assert!(!renderer.engine().is_in_frame());
        assert_eq!(renderer.engine().events().last(), Some(&EngineEvent::AbortFrame));
        assert_eq!(renderer.info().frame, 1);

        // The flag survives, so the next frame retries the upload
        let info = renderer.render(&scene, &camera).unwrap();
        assert_eq!(info.uploads, 1);
        assert!(!positions.needs_update());
    }

    #[test]
    fn test_failed_draw_aborts_frame() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let scene = Scene::new();
        scene
            .add_child(&Mesh::new(box_geometry(1.0, 1.0, 1.0).unwrap(), basic()))
            .unwrap();
        let camera = camera();
        renderer.render(&scene, &camera).unwrap();

        renderer.engine_mut().clear_events();
        renderer.engine_mut().fail_next_draw("device lost");
        assert!(renderer.render(&scene, &camera).is_err());
        assert!(!renderer.engine().is_in_frame());
        assert!(matches!(
            renderer.engine().events(),
            [EngineEvent::BeginFrame(_), EngineEvent::AbortFrame]
        ));
        assert_eq!(renderer.render(&scene, &camera).unwrap().calls, 1);
    }

    #[test]
    fn test_dropped_attributes_are_released() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let scene = Scene::new();
        let geometry = BufferGeometry::new();
        scene
            .add_child(&Points::new(geometry.clone(), Material::points(MaterialParameters::new())))
            .unwrap();
        let camera = camera();

        for frame in 0..100 {
            let positions = BufferAttribute::float32(vec![frame as f32; 30], 3).unwrap();
            geometry.add_attribute("position", positions);
            renderer.render(&scene, &camera).unwrap();
        }
        assert_eq!(renderer.engine().resident_count(), 1);
        assert_eq!(renderer.info().released, 1);

        // Hidden but still alive attributes stay resident
        scene.set_visible(false);
        renderer.render(&scene, &camera).unwrap();
        assert_eq!(renderer.engine().resident_count(), 1);

        geometry.remove_attribute("position");
        assert_eq!(renderer.release_dropped_attributes(), 1);
        assert_eq!(renderer.engine().resident_count(), 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_vertex_count_overflow() {
        assert_eq!(checked_vertex_count(36).unwrap(), 36);
        assert!(matches!(
            checked_vertex_count(u32::MAX as usize + 1),
            Err(TartanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_frame_counter() {
        let mut renderer = Renderer::new(RecordingEngine::new()).unwrap();
        let scene = Scene::new();
        let camera = camera();
        renderer.render(&scene, &camera).unwrap();
        let info = renderer.render(&scene, &camera).unwrap();
        assert_eq!(info.frame, 2);
        assert_eq!(renderer.info(), info);
    }
}
