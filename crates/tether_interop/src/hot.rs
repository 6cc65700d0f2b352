//! Built-in bindings for the members scripts touch every frame
//!
//! Installed once, on the first dispatch, over a [`HostEnvironment`] the
//! embedder keeps updating (clock, screen, random stream).

use crate::handle::{shared, Shared};
use crate::runtime::InteropRuntime;
use glam::{Quat, Vec3};
use tether_core::math::{Color, DeterministicRng, Transform};
use tether_core::screen::Screen;
use tether_core::time::FrameClock;
use tracing::debug;

crate::blittable!(Color {
    r: f32,
    g: f32,
    b: f32,
    a: f32,
});

crate::interop_struct!(Color);

/// Host state read by the built-in bindings.
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    pub clock: Shared<FrameClock>,
    pub screen: Shared<Screen>,
    pub rng: Shared<DeterministicRng>,
}

impl HostEnvironment {
    pub fn new(seed: u64) -> Self {
        Self {
            clock: shared(FrameClock::new()),
            screen: shared(Screen::default()),
            rng: shared(DeterministicRng::new(seed)),
        }
    }
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self::new(0x5EED)
    }
}

/// Register every built-in binding.
pub fn install(rt: &mut InteropRuntime, env: &HostEnvironment) {
    install_time(rt, &env.clock);
    install_screen(rt, &env.screen);
    install_transform(rt);
    install_color(rt);
    install_random(rt, &env.rng);
    install_mathf(rt);
    install_vector3(rt);
    debug!("Installed {} built-in bindings", rt.count());
}

fn install_time(rt: &mut InteropRuntime, clock: &Shared<FrameClock>) {
    let (c0, c1, c2, c3, c4) = (
        clock.clone(),
        clock.clone(),
        clock.clone(),
        clock.clone(),
        clock.clone(),
    );
    rt.bind::<FrameClock>()
        .alias("Time")
        .static_getter("deltaTime", move || c0.borrow().delta_time())
        .static_getter("time", move || c1.borrow().time())
        .static_getter("frameCount", move || c2.borrow().frame_count())
        .static_property(
            "timeScale",
            move || c3.borrow().time_scale(),
            move |scale: f32| c4.borrow_mut().set_time_scale(scale),
        );
}

fn install_screen(rt: &mut InteropRuntime, screen: &Shared<Screen>) {
    let (s0, s1, s2, s3) = (screen.clone(), screen.clone(), screen.clone(), screen.clone());
    rt.bind::<Screen>()
        .static_getter("width", move || s0.borrow().width)
        .static_getter("height", move || s1.borrow().height)
        .static_getter("dpi", move || s2.borrow().dpi)
        .static_getter("aspect", move || s3.borrow().aspect());
}

fn install_transform(rt: &mut InteropRuntime) {
    rt.bind::<Transform>()
        .property(
            "position",
            |t: &Transform| t.position,
            |t: &mut Transform, p: Vec3| t.position = p,
        )
        .property(
            "rotation",
            |t: &Transform| t.rotation,
            |t: &mut Transform, r: Quat| t.rotation = r.normalize(),
        )
        .property(
            "localScale",
            |t: &Transform| t.local_scale,
            |t: &mut Transform, s: Vec3| t.local_scale = s,
        )
        .getter("forward", |t: &Transform| t.forward())
        .method("translate", |t: &mut Transform, by: Vec3| t.translate(by))
        .method("lookAt", |t: &mut Transform, target: Vec3| t.look_at(target));
}

fn install_color(rt: &mut InteropRuntime) {
    rt.register_blittable_struct::<Color>();
    rt.bind::<Color>()
        .static_getter("white", || Color::WHITE)
        .static_getter("black", || Color::BLACK)
        .static_method("lerp", |a: Color, b: Color, t: f32| a.lerp(b, t));
}

fn install_random(rt: &mut InteropRuntime, rng: &Shared<DeterministicRng>) {
    let (r0, r1, r2) = (rng.clone(), rng.clone(), rng.clone());
    rt.register_static_getter_by_type_name("Random", "value", move || r0.borrow_mut().next_f32());
    rt.register_static_method_by_type_name("Random", "range", move |min: f32, max: f32| {
        r1.borrow_mut().range(min, max)
    });
    rt.register_static_method_by_type_name("Random", "reset", move || r2.borrow_mut().reset());
}

fn install_mathf(rt: &mut InteropRuntime) {
    rt.register_static_getter_by_type_name("Mathf", "PI", || std::f32::consts::PI);
    rt.register_static_method_by_type_name("Mathf", "abs", |v: f32| v.abs());
    rt.register_static_method_by_type_name("Mathf", "sqrt", |v: f32| v.sqrt());
    rt.register_static_method_by_type_name("Mathf", "sin", |v: f32| v.sin());
    rt.register_static_method_by_type_name("Mathf", "cos", |v: f32| v.cos());
    rt.register_static_method_by_type_name("Mathf", "min", |a: f32, b: f32| a.min(b));
    rt.register_static_method_by_type_name("Mathf", "max", |a: f32, b: f32| a.max(b));
    rt.register_static_method_by_type_name("Mathf", "clamp", |v: f32, lo: f32, hi: f32| {
        v.max(lo).min(hi)
    });
    rt.register_static_method_by_type_name("Mathf", "lerp", |a: f32, b: f32, t: f32| {
        a + (b - a) * t.clamp(0.0, 1.0)
    });
    rt.register_static_method_by_type_name("Mathf", "atan2", |y: f32, x: f32| y.atan2(x));
    rt.register_static_method_by_type_name("Mathf", "pow", |v: f32, p: f32| v.powf(p));
}

fn install_vector3(rt: &mut InteropRuntime) {
    rt.register_static_getter_by_type_name("Vector3", "zero", || Vec3::ZERO);
    rt.register_static_getter_by_type_name("Vector3", "one", || Vec3::ONE);
    rt.register_static_getter_by_type_name("Vector3", "up", || Vec3::Y);
    rt.register_static_getter_by_type_name("Vector3", "forward", || Vec3::Z);
    rt.register_static_method_by_type_name("Vector3", "distance", |a: Vec3, b: Vec3| a.distance(b));
    rt.register_static_method_by_type_name("Vector3", "dot", |a: Vec3, b: Vec3| a.dot(b));
    rt.register_static_method_by_type_name("Vector3", "cross", |a: Vec3, b: Vec3| a.cross(b));
    rt.register_static_method_by_type_name("Vector3", "normalize", |v: Vec3| v.normalize_or_zero());
    rt.register_static_method_by_type_name("Vector3", "lerp", |a: Vec3, b: Vec3, t: f32| {
        a.lerp(b, t.clamp(0.0, 1.0))
    });
}
