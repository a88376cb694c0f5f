// Orbit – A bouncy ball rendering demo
// Copyright (C) 2023  Neil Roberts
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! The render thread. It owns the GL context, runs the work submitted
//! through the [`RenderQueue`] and draws every shape once per frame.

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use crossbeam::channel::{self, select, Receiver, Sender, TryRecvError};
use nalgebra::{Matrix4, Vector3};
use parking_lot::{Mutex, MutexGuard};
use crate::frame_pacer::{self, FramePacer, FrameStats};
use crate::gpu::Gpu;
use crate::paint_data::{CurrentGuard, PaintData};
use crate::render_queue::{RenderQueue, WorkReceiver};
use crate::settings::Settings;
use crate::shape;
use crate::shape_manager::ShapeManager;
use crate::size::Size;

// Iterations of busy work per unit of workload
const WORKLOAD_ITERATIONS: u32 = 10_000;

/// The platform side of rendering: a surface to draw on and a GL
/// context for it. Everything except construction happens on the
/// render thread.
pub trait Display: Send + 'static {
    type Window: Send + 'static;

    /// Starts drawing to `window`, or stops drawing to the current one.
    /// The GL context outlives the window.
    fn set_window(&mut self, window: Option<Self::Window>) -> Result<(), String>;

    /// Creates the GL context and makes it current. Only called once a
    /// window has been set.
    fn create_context(&mut self) -> Result<Rc<dyn Gpu>, String>;

    fn swap_buffers(&mut self) -> Result<(), String>;
}

enum Command<W> {
    SetWindow(Option<W>, Size),
    SetViewport(i32, i32, i32, i32),
    Start,
    Stop,
    SetWorkload(i32),
    SetAutoSwapInterval(bool),
    SetBackgroundColor(Vector3<f32>),
    Quit,
}

/// State read from other threads.
struct Shared {
    // f32 bits
    average_fps: AtomicU32,
    stats_enabled: AtomicBool,
    stats: Mutex<FrameStats>,
    // Held by the render thread while it reads the shapes
    draw_lock: Mutex<()>,
}

/// Keeps the render thread from drawing until it is dropped, so that
/// several shape changes show up in the same frame.
pub struct DrawLock<'a> {
    _guard: MutexGuard<'a, ()>,
}

struct RenderContext {
    // Dropped before the paint data
    _guard: CurrentGuard,
    paint_data: Rc<PaintData>,
}

/// Orthographic projection mapping the viewport in pixels to clip
/// space with the origin at the top left and y pointing down.
pub fn viewport_projection(x: i32, y: i32, width: i32, height: i32) -> Matrix4<f32> {
    Matrix4::new_orthographic(
        x as f32,
        (x + width.max(1)) as f32,
        (y + height.max(1)) as f32,
        y as f32,
        -1.0,
        1.0,
    )
}

fn run_workload(load: i32) {
    let mut value = 0.0f64;

    for i in 0..load.max(0) as u32 * WORKLOAD_ITERATIONS {
        value += (i as f64).sqrt().sin();
    }

    std::hint::black_box(value);
}

struct RenderThread<D: Display> {
    context: Option<RenderContext>,
    display: D,
    commands: Receiver<Command<D::Window>>,
    work: WorkReceiver,
    shape_manager: Arc<ShapeManager>,
    settings: Arc<Settings>,
    shared: Arc<Shared>,
    has_window: bool,
    running: bool,
    viewport: (i32, i32, i32, i32),
    workload: i32,
    background_color: Vector3<f32>,
    pacer: FramePacer,
}

enum Event<W> {
    Command(Option<Command<W>>),
    Work(Option<crate::render_queue::Work>),
}

impl<D: Display> RenderThread<D> {
    fn is_drawing(&self) -> bool {
        self.running && self.has_window && self.context.is_some()
    }

    fn run(mut self) {
        loop {
            if self.is_drawing() {
                if let Some(context) = self.context.as_ref() {
                    self.work.run_pending(&context.paint_data);
                }

                if !self.handle_pending_commands() {
                    break;
                }

                if self.is_drawing() {
                    self.draw_frame();
                }

                continue;
            }

            let event = match self.context.as_ref() {
                Some(_) => select! {
                    recv(self.commands) -> command => Event::Command(command.ok()),
                    recv(self.work.receiver()) -> work => Event::Work(work.ok()),
                },
                None => Event::Command(self.commands.recv().ok()),
            };

            match event {
                Event::Command(Some(command)) => {
                    if !self.handle_command(command) {
                        break;
                    }
                },
                // The renderer has gone away
                Event::Command(None) => break,
                Event::Work(Some(work)) => {
                    if let Some(context) = self.context.as_ref() {
                        work(&*context.paint_data);
                    }
                },
                Event::Work(None) => {},
            }
        }

        self.shutdown();
    }

    fn handle_pending_commands(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    if !self.handle_command(command) {
                        return false;
                    }
                },
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Returns false if the thread should quit.
    fn handle_command(&mut self, command: Command<D::Window>) -> bool {
        match command {
            Command::SetWindow(window, size) => self.set_window(window, size),
            Command::SetViewport(x, y, width, height) => {
                self.viewport = (x, y, width, height);
            },
            Command::Start => {
                log::info!("Starting rendering");
                self.running = true;
            },
            Command::Stop => {
                log::info!("Stopping rendering");
                self.running = false;
            },
            Command::SetWorkload(load) => self.workload = load,
            Command::SetAutoSwapInterval(enabled) => {
                self.pacer.set_auto_swap_interval(enabled);
            },
            Command::SetBackgroundColor(color) => {
                self.background_color = color;
            },
            Command::Quit => return false,
        }

        true
    }

    fn set_window(&mut self, window: Option<D::Window>, size: Size) {
        let has_window = window.is_some();

        self.has_window = false;

        if let Err(e) = self.display.set_window(window) {
            log::error!("Failed to set window: {}", e);
            return;
        }

        if !has_window {
            return;
        }

        if self.context.is_none() {
            match self.display.create_context() {
                Ok(gpu) => {
                    let paint_data = Rc::new(PaintData::new(gpu));
                    let guard = paint_data.make_current();

                    if !self.shape_manager.init_programs(&paint_data) {
                        log::warn!("Some shader programs failed to build");
                    }

                    self.context = Some(RenderContext {
                        _guard: guard,
                        paint_data,
                    });
                },
                Err(e) => {
                    log::error!("Failed to create GL context: {}", e);
                    return;
                },
            }
        }

        self.viewport = (0, 0, size.width, size.height);
        self.has_window = true;
    }

    fn draw_frame(&mut self) {
        let Some(context) = self.context.as_ref()
        else {
            return;
        };

        let paint_data = Rc::clone(&context.paint_data);
        let gpu = &*paint_data.gpu;

        let frame_start = Instant::now();

        let (x, y, width, height) = self.viewport;

        let shared = Arc::clone(&self.shared);
        let draw_lock = shared.draw_lock.lock();

        let background = self.background_color;

        gpu.viewport(x, y, width, height);
        gpu.clear_color(background.x, background.y, background.z, 1.0);
        gpu.clear(glow::COLOR_BUFFER_BIT);
        gpu.enable(glow::BLEND);
        gpu.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);

        let projection = viewport_projection(x, y, width, height);
        let model = Matrix4::identity();

        let mut shapes = self.shape_manager.shape_list();
        shape::sort_for_drawing(&mut shapes);

        for (_, shape) in shapes.iter() {
            shape.lock().draw(&paint_data, &projection, &model);
        }

        // Release our references before any of the shapes’ drop
        // handlers could want the lock
        drop(shapes);

        // Pacing doesn’t touch the shapes so updates can land while we wait
        drop(draw_lock);

        run_workload(self.workload);

        self.pacer.configure(
            self.settings.refresh_period(),
            self.settings.swap_interval(),
        );

        let idle = match self.pacer.deadline() {
            Some(deadline) => frame_pacer::wait_until(
                deadline,
                self.settings.hot_pocket(),
            ),
            None => Duration::ZERO,
        };

        if let Err(e) = self.display.swap_buffers() {
            log::warn!("Failed to swap buffers: {}", e);
        }

        let sample = self.pacer.record_present(
            frame_start,
            Instant::now(),
            idle,
        );

        self.shared.average_fps.store(
            self.pacer.average_fps().to_bits(),
            Ordering::Relaxed,
        );

        if self.shared.stats_enabled.load(Ordering::Relaxed) {
            self.shared.stats.lock().record(&sample);
        }
    }

    fn shutdown(&mut self) {
        if let Some(context) = self.context.as_ref() {
            self.work.run_pending(&context.paint_data);
        }

        // Delete the programs while the display is still alive
        self.context = None;

        if let Err(e) = self.display.set_window(None) {
            log::warn!("Failed to release window: {}", e);
        }
    }
}

/// Owns the render thread. Dropping it stops the thread and waits for
/// it to finish.
pub struct Renderer<D: Display> {
    commands: Sender<Command<D::Window>>,
    queue: RenderQueue,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl<D: Display> Renderer<D> {
    pub fn new(
        display: D,
        shape_manager: Arc<ShapeManager>,
        settings: Arc<Settings>,
    ) -> Result<Renderer<D>, String> {
        let (commands_sender, commands) = channel::unbounded();
        let (queue, work) = RenderQueue::new();

        let shared = Arc::new(Shared {
            average_fps: AtomicU32::new(0.0f32.to_bits()),
            stats_enabled: AtomicBool::new(false),
            stats: Mutex::new(FrameStats::default()),
            draw_lock: Mutex::new(()),
        });

        let pacer = FramePacer::new(
            settings.refresh_period(),
            settings.swap_interval(),
        );

        let thread_shared = Arc::clone(&shared);

        let thread = std::thread::Builder::new()
            .name("render".to_string())
            .spawn(move || {
                RenderThread {
                    context: None,
                    display,
                    commands,
                    work,
                    shape_manager,
                    settings,
                    shared: thread_shared,
                    has_window: false,
                    running: false,
                    viewport: (0, 0, 0, 0),
                    workload: 0,
                    background_color: Vector3::zeros(),
                    pacer,
                }.run()
            })
            .map_err(|e| format!("Failed to start render thread: {}", e))?;

        Ok(Renderer {
            commands: commands_sender,
            queue,
            shared,
            thread: Some(thread),
        })
    }

    fn send(&self, command: Command<D::Window>) {
        if self.commands.send(command).is_err() {
            log::warn!("Render thread is no longer running");
        }
    }

    pub fn queue(&self) -> RenderQueue {
        self.queue.clone()
    }

    /// Starts drawing to `window`. The viewport is reset to cover the
    /// whole of it.
    pub fn set_window(&self, window: D::Window, size: Size) {
        self.send(Command::SetWindow(Some(window), size));
    }

    pub fn clear_window(&self) {
        self.send(Command::SetWindow(None, Size::default()));
    }

    pub fn set_viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.send(Command::SetViewport(x, y, width, height));
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn set_workload(&self, load: i32) {
        self.send(Command::SetWorkload(load));
    }

    pub fn set_auto_swap_interval(&self, enabled: bool) {
        self.send(Command::SetAutoSwapInterval(enabled));
    }

    /// Sets the colour that each frame is cleared to. The components
    /// are in the range 0 to 1.
    pub fn set_background_color(&self, color: Vector3<f32>) {
        self.send(Command::SetBackgroundColor(color));
    }

    /// Stops frames from being drawn until the returned guard is
    /// dropped. Waiting on the render queue while holding it would
    /// deadlock if the render thread is waiting to draw.
    pub fn lock_draw(&self) -> DrawLock<'_> {
        DrawLock { _guard: self.shared.draw_lock.lock() }
    }

    pub fn average_fps(&self) -> f32 {
        f32::from_bits(self.shared.average_fps.load(Ordering::Relaxed))
    }

    /// Percentage of frames in `bin` of statistic number `stat`. Stats
    /// are only collected after the first call.
    pub fn frame_stat(&self, stat: i32, bin: i32) -> i32 {
        self.shared.stats_enabled.store(true, Ordering::Relaxed);
        self.shared.stats.lock().percentage(stat, bin)
    }
}

impl<D: Display> Drop for Renderer<D> {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Quit);

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Render thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use nalgebra::{Point3, Vector2, Vector4};
    use crate::circle::Circle;
    use crate::shape::{Shape, share};
    use crate::sprite::Sprite;
    use crate::test_gpu::{CallLog, TestGpu, Call};

    const TIMEOUT: Duration = Duration::from_secs(10);

    struct TestDisplay {
        log: CallLog,
        contexts_created: Arc<AtomicUsize>,
        windows: Arc<Mutex<Vec<Option<u32>>>>,
        frames: Sender<()>,
    }

    impl Display for TestDisplay {
        type Window = u32;

        fn set_window(&mut self, window: Option<u32>) -> Result<(), String> {
            self.windows.lock().push(window);
            Ok(())
        }

        fn create_context(&mut self) -> Result<Rc<dyn Gpu>, String> {
            self.contexts_created.fetch_add(1, Ordering::SeqCst);
            Ok(Rc::new(TestGpu::with_log(self.log.clone())))
        }

        fn swap_buffers(&mut self) -> Result<(), String> {
            let _ = self.frames.send(());
            Ok(())
        }
    }

    struct Harness {
        renderer: Renderer<TestDisplay>,
        shapes: Arc<ShapeManager>,
        log: CallLog,
        contexts_created: Arc<AtomicUsize>,
        windows: Arc<Mutex<Vec<Option<u32>>>>,
        frames: Receiver<()>,
    }

    impl Harness {
        fn new() -> Harness {
            let log = CallLog::default();
            let contexts_created = Arc::new(AtomicUsize::new(0));
            let windows = Arc::new(Mutex::new(Vec::new()));
            let (frames_sender, frames) = channel::unbounded();

            let settings = Arc::new(Settings::new());
            settings.set_preference("swap_interval", "1");
            settings.set_preference("refresh_period", "1000000");

            let shapes = Arc::new(ShapeManager::new());

            let display = TestDisplay {
                log: log.clone(),
                contexts_created: Arc::clone(&contexts_created),
                windows: Arc::clone(&windows),
                frames: frames_sender,
            };

            let renderer = Renderer::new(
                display,
                Arc::clone(&shapes),
                settings,
            ).unwrap();

            Harness {
                renderer,
                shapes,
                log,
                contexts_created,
                windows,
                frames,
            }
        }

        fn wait_for_frame(&self) {
            self.frames.recv_timeout(TIMEOUT).unwrap();
        }

        // Waits until the render thread has handled everything sent so far
        fn sync(&self) {
            let queue = self.renderer.queue();
            assert_eq!(queue.run_and_wait(|_| ()), Some(()));
        }
    }

    struct RecordingShape {
        name: &'static str,
        layer: i32,
        depth: f32,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Shape for RecordingShape {
        fn draw(&mut self, _: &PaintData, _: &Matrix4<f32>, _: &Matrix4<f32>) {
            self.order.lock().push(self.name);
        }

        fn layer(&self) -> i32 {
            self.layer
        }

        fn depth(&self) -> f32 {
            self.depth
        }
    }

    #[test]
    fn projection() {
        let projection = viewport_projection(0, 0, 200, 100);

        let top_left = projection.transform_point(&Point3::new(0.0, 0.0, 0.0));
        let bottom_right =
            projection.transform_point(&Point3::new(200.0, 100.0, 0.0));

        assert!((top_left.x + 1.0).abs() < 1e-6);
        assert!((top_left.y - 1.0).abs() < 1e-6);
        assert!((bottom_right.x - 1.0).abs() < 1e-6);
        assert!((bottom_right.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn work_waits_for_context() {
        let harness = Harness::new();
        let queue = harness.renderer.queue();
        let ran = Arc::new(AtomicBool::new(false));

        {
            let ran = Arc::clone(&ran);
            queue.run(move |_| ran.store(true, Ordering::SeqCst));
        }

        // Nothing can run without a GL context
        std::thread::sleep(Duration::from_millis(20));
        assert!(!ran.load(Ordering::SeqCst));

        harness.renderer.set_window(1, Size::new(64, 32));

        let on_render_thread = queue.run_and_wait(|_| {
            PaintData::current().is_some()
        });

        assert_eq!(on_render_thread, Some(true));
        assert!(ran.load(Ordering::SeqCst));

        // The programs were built along with the context
        assert_eq!(
            harness.log.count(|c| matches!(c, Call::CreateProgram(_))),
            5,
        );
    }

    #[test]
    fn draws_in_order() {
        let harness = Harness::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (name, layer, depth) in [
            ("front", 2, 0.0),
            ("back", -1, 5.0),
            ("middle-far", 0, 1.0),
            ("middle-near", 0, 0.5),
            ("middle-near-later", 0, 0.5),
        ] {
            harness.shapes.add(share(RecordingShape {
                name,
                layer,
                depth,
                order: Arc::clone(&order),
            }));
        }

        harness.renderer.set_window(1, Size::new(64, 32));
        harness.renderer.start();
        harness.wait_for_frame();
        harness.renderer.stop();
        harness.sync();

        let order = order.lock();

        assert_eq!(
            &order[0..5],
            &[
                "back",
                "middle-near",
                "middle-near-later",
                "middle-far",
                "front",
            ],
        );

        assert!(harness.log.contains(&Call::Viewport(0, 0, 64, 32)));
        assert!(harness.log.contains(&Call::Enable(glow::BLEND)));
        assert!(harness.log.contains(&Call::BlendFunc(
            glow::SRC_ALPHA,
            glow::ONE_MINUS_SRC_ALPHA,
        )));
    }

    #[test]
    fn stop_keeps_running_work() {
        let harness = Harness::new();

        harness.renderer.set_window(1, Size::new(64, 32));
        harness.renderer.start();
        harness.wait_for_frame();
        harness.renderer.stop();
        harness.sync();

        while harness.frames.try_recv().is_ok() {}

        // Work still runs while stopped but no frames are drawn
        harness.sync();
        std::thread::sleep(Duration::from_millis(20));
        assert!(harness.frames.try_recv().is_err());

        harness.renderer.start();
        harness.wait_for_frame();
    }

    #[test]
    fn clear_window_keeps_context() {
        let harness = Harness::new();

        harness.renderer.set_window(1, Size::new(64, 32));
        harness.renderer.clear_window();
        harness.renderer.set_window(2, Size::new(32, 64));
        harness.renderer.set_viewport(4, 4, 16, 16);
        harness.renderer.start();
        harness.wait_for_frame();
        harness.renderer.stop();
        harness.sync();

        assert_eq!(harness.contexts_created.load(Ordering::SeqCst), 1);
        assert_eq!(*harness.windows.lock(), vec![Some(1), None, Some(2)]);
        assert!(harness.log.contains(&Call::Viewport(4, 4, 16, 16)));
    }

    #[test]
    fn draws_sprites() {
        let harness = Harness::new();
        let queue = harness.renderer.queue();

        let mut sprite = Sprite::new(queue, None, 1, 1);
        sprite.set_position(Vector2::new(32.0, 16.0));
        sprite.set_size(Vector2::new(8.0, 8.0));
        sprite.show();
        harness.shapes.add(share(sprite));

        let mut circle = Circle::new(
            harness.renderer.queue(),
            Vector2::new(10.0, 10.0),
            4.0,
            Vector4::new(1.0, 1.0, 1.0, 1.0),
        );
        circle.show();
        harness.shapes.add(share(circle));

        harness.renderer.set_window(1, Size::new(64, 32));
        harness.renderer.start();
        harness.wait_for_frame();
        harness.renderer.stop();
        harness.sync();

        assert!(harness.log.contains(&Call::DrawArrays {
            mode: glow::TRIANGLES,
            first: 0,
            count: 6,
        }));
        assert!(harness.log.contains(&Call::DrawArrays {
            mode: glow::TRIANGLE_FAN,
            first: 0,
            count: 34,
        }));

        // Removing the shapes releases their buffers on the render thread
        harness.shapes.release_all();
        harness.sync();

        assert_eq!(
            harness.log.count(|c| matches!(c, Call::DeleteVertexArray(_))),
            2,
        );
    }

    #[test]
    fn background_color() {
        let harness = Harness::new();

        harness.renderer.set_window(1, Size::new(64, 32));
        harness.renderer.start();
        harness.wait_for_frame();

        assert!(harness.log.contains(&Call::ClearColor([0.0, 0.0, 0.0, 1.0])));

        harness.renderer.set_background_color(Vector3::new(0.25, 0.5, 0.75));
        harness.sync();

        // Anything still queued was drawn before the change
        while harness.frames.try_recv().is_ok() {}
        harness.wait_for_frame();
        harness.renderer.stop();
        harness.sync();

        assert!(harness.log.contains(&Call::ClearColor([0.25, 0.5, 0.75, 1.0])));
    }

    #[test]
    fn draw_lock_holds_frames() {
        let harness = Harness::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        harness.renderer.set_window(1, Size::new(64, 32));
        harness.sync();

        let lock = harness.renderer.lock_draw();

        harness.renderer.start();
        std::thread::sleep(Duration::from_millis(50));
        assert!(harness.frames.try_recv().is_err());

        // Both shapes appear in the first frame together
        for (name, layer) in [("first", 0), ("second", 1)] {
            harness.shapes.add(share(RecordingShape {
                name,
                layer,
                depth: 0.0,
                order: Arc::clone(&order),
            }));
        }

        drop(lock);

        harness.wait_for_frame();
        harness.renderer.stop();
        harness.sync();

        assert_eq!(&order.lock()[0..2], &["first", "second"]);
    }

    #[test]
    fn frame_stats() {
        let harness = Harness::new();

        assert_eq!(harness.renderer.frame_stat(4, 0), 0);
        assert_eq!(harness.renderer.average_fps(), 0.0);

        harness.renderer.set_window(1, Size::new(64, 32));
        harness.renderer.set_workload(1);
        harness.renderer.start();

        for _ in 0..5 {
            harness.wait_for_frame();
        }

        harness.renderer.stop();
        harness.sync();

        let total = harness.renderer.frame_stat(4, 0);
        assert!(total >= 4);
        assert!(harness.renderer.average_fps() > 0.0);

        let latency_sum = (0..frame_pacer::MAX_FRAME_BUCKETS as i32)
            .map(|bin| harness.renderer.frame_stat(3, bin))
            .sum::<i32>();
        assert!((97..=103).contains(&latency_sum));
    }

    #[test]
    fn drop_joins_thread() {
        let harness = Harness::new();
        let queue = harness.renderer.queue();

        harness.renderer.set_window(1, Size::new(64, 32));
        harness.renderer.start();
        harness.wait_for_frame();

        let windows = Arc::clone(&harness.windows);

        drop(harness);

        assert_eq!(windows.lock().last(), Some(&None));

        // Submitting after the thread is gone is harmless
        queue.run(|_| unreachable!());
        assert_eq!(queue.run_and_wait(|_| 1), None);
    }
}
