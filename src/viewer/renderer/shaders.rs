//! Embedded shaders for the depth pass and the bokeh composite.

use physical_material::{OutputOptions, OUTPUT_LIB};

use crate::viewer::params::ShaderQuality;

/// Scene override pass: writes `1 - smoothstep(m_near, m_far, view_depth)`
/// to all color channels.
pub const DEPTH_SHADER: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    camera_position: vec3<f32>,
    _pad0: f32,
    fog_color: vec3<f32>,
    fog_near: f32,
    fog_far: f32,
    _pad1: f32,
    _pad2: f32,
    _pad3: f32,
}

struct Model {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
}

struct DepthParams {
    m_near: f32,
    m_far: f32,
    _pad0: f32,
    _pad1: f32,
}

@group(0) @binding(0) var<uniform> frame: Frame;
@group(1) @binding(0) var<uniform> model: Model;
@group(2) @binding(0) var<uniform> params: DepthParams;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) view_z_depth: f32,
}

@vertex
fn vs_depth(@location(0) position: vec3<f32>) -> VsOut {
    let world = model.model * vec4<f32>(position, 1.0);
    let view_pos = frame.view * world;
    var out: VsOut;
    out.pos = frame.view_proj * world;
    out.view_z_depth = -view_pos.z;
    return out;
}

@fragment
fn fs_depth(in: VsOut) -> @location(0) vec4<f32> {
    let color = 1.0 - smoothstep(params.m_near, params.m_far, in.view_z_depth);
    return vec4<f32>(vec3<f32>(color), 1.0);
}
"#;

/// Bokeh composite. RINGS / SAMPLES and the output constants are prepended
/// by [`bokeh_shader_source`].
pub const BOKEH_SHADER: &str = r#"
struct Bokeh {
    focus_coords: vec2<f32>,
    texture_width: f32,
    texture_height: f32,
    focal_depth: f32,
    focal_length: f32,
    fstop: f32,
    maxblur: f32,
    show_focus: f32,
    manualdof: f32,
    vignetting: f32,
    depthblur: f32,
    threshold: f32,
    gain: f32,
    bias: f32,
    fringe: f32,
    znear: f32,
    zfar: f32,
    noise: f32,
    dithering: f32,
    pentagon: f32,
    shader_focus: f32,
    _pad0: f32,
    _pad1: f32,
}

struct Quad {
    mvp: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> bokeh: Bokeh;
@group(0) @binding(1) var t_color: texture_2d<f32>;
@group(0) @binding(2) var t_depth: texture_2d<f32>;
@group(0) @binding(3) var t_sampler: sampler;
@group(0) @binding(4) var<uniform> quad: Quad;

// Manual dof: near/far start and falloff distances
const NDOF_START: f32 = 1.0;
const NDOF_DIST: f32 = 2.0;
const FDOF_START: f32 = 1.0;
const FDOF_DIST: f32 = 3.0;

// Circle of confusion in mm (35mm film)
const COC: f32 = 0.03;

const VIGN_OUT: f32 = 1.3;
const VIGN_IN: f32 = 0.0;
const VIGN_FADE: f32 = 22.0;

// Depth blur kernel size
const DB_SIZE: f32 = 1.25;

// Pentagon edge feather
const FEATHER: f32 = 0.4;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_quad(@builtin(vertex_index) index: u32) -> VsOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, -0.5),
        vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, 0.5)
    );
    let c = corners[index];
    var out: VsOut;
    out.pos = quad.mvp * vec4<f32>(c, 0.0, 1.0);
    // Texture rows run top to bottom
    out.uv = vec2<f32>(c.x + 0.5, 0.5 - c.y);
    return out;
}

fn flag(v: f32) -> bool {
    return v > 0.5;
}

fn texel() -> vec2<f32> {
    return vec2<f32>(1.0 / bokeh.texture_width, 1.0 / bokeh.texture_height);
}

// Hermite step that tolerates edge0 > edge1
fn hermite(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

fn penta(coords: vec2<f32>) -> f32 {
    let scale = f32(RINGS) - 1.3;
    let hs0 = vec4<f32>(1.0, 0.0, 0.0, 1.0);
    let hs1 = vec4<f32>(0.309016994, 0.951056516, 0.0, 1.0);
    let hs2 = vec4<f32>(-0.809016994, 0.587785252, 0.0, 1.0);
    let hs3 = vec4<f32>(-0.809016994, -0.587785252, 0.0, 1.0);
    let hs4 = vec4<f32>(0.309016994, -0.951056516, 0.0, 1.0);
    let hs5 = vec4<f32>(0.0, 0.0, 1.0, 1.0);

    let p = vec4<f32>(coords, vec2<f32>(scale, scale));
    var dist = vec4<f32>(dot(p, hs0), dot(p, hs1), dot(p, hs2), dot(p, hs3));
    dist = smoothstep(vec4<f32>(-FEATHER), vec4<f32>(FEATHER), dist);
    var inorout = -4.0 + dot(dist, vec4<f32>(1.0));

    var rest = vec2<f32>(dot(p, hs4), hs5.w - abs(p.z));
    rest = smoothstep(vec2<f32>(-FEATHER), vec2<f32>(FEATHER), rest);
    inorout += rest.x;
    return clamp(inorout, 0.0, 1.0);
}

// 3x3 gaussian over the depth target
fn bdepth(coords: vec2<f32>) -> f32 {
    let wh = texel() * DB_SIZE;
    var d = 0.0;
    for (var y = -1; y <= 1; y++) {
        for (var x = -1; x <= 1; x++) {
            let weight = (2.0 - abs(f32(x))) * (2.0 - abs(f32(y))) / 16.0;
            let offset = vec2<f32>(f32(x), f32(y)) * wh;
            d += textureSampleLevel(t_depth, t_sampler, coords + offset, 0.0).r * weight;
        }
    }
    return d;
}

// Chromatic fringe plus highlight gain
fn color(coords: vec2<f32>, blur: f32) -> vec3<f32> {
    let spread = texel() * bokeh.fringe * blur;
    let r = textureSampleLevel(t_color, t_sampler, coords + vec2<f32>(0.0, -1.0) * spread, 0.0).r;
    let g = textureSampleLevel(t_color, t_sampler, coords + vec2<f32>(-0.866, 0.5) * spread, 0.0).g;
    let b = textureSampleLevel(t_color, t_sampler, coords + vec2<f32>(0.866, 0.5) * spread, 0.0).b;
    let col = vec3<f32>(r, g, b);

    let lum = dot(col, vec3<f32>(0.299, 0.587, 0.114));
    let thresh = max((lum - bokeh.threshold) * bokeh.gain, 0.0);
    return col + mix(vec3<f32>(0.0), col, thresh * blur);
}

fn debug_focus(col_in: vec3<f32>, blur: f32, depth: f32) -> vec3<f32> {
    let edge = 0.002 * depth;
    let m = clamp(smoothstep(0.0, edge, blur), 0.0, 1.0);
    let e = clamp(smoothstep(1.0 - edge, 1.0, blur), 0.0, 1.0);
    var col = mix(col_in, vec3<f32>(1.0, 0.5, 0.0), (1.0 - m) * 0.6);
    col = mix(col, vec3<f32>(0.0, 0.5, 1.0), ((1.0 - e) - (1.0 - m)) * 0.2);
    return col;
}

fn linearize(depth: f32) -> f32 {
    return -bokeh.zfar * bokeh.znear / (depth * (bokeh.zfar - bokeh.znear) - bokeh.zfar);
}

fn vignette(uv: vec2<f32>) -> f32 {
    let dist = distance(uv, vec2<f32>(0.5, 0.5));
    let fade = bokeh.fstop / VIGN_FADE;
    return clamp(hermite(VIGN_OUT + fade, VIGN_IN + fade, dist), 0.0, 1.0);
}

// Dither pattern, or white noise when `noise` is on
fn rand(coord: vec2<f32>) -> vec2<f32> {
    let half_size = vec2<f32>(bokeh.texture_width, bokeh.texture_height) / 2.0;
    let px = fract(1.0 - coord.x * half_size.x);
    let py = fract(coord.y * half_size.y);
    var n = vec2<f32>(
        (px * 0.25 + py * 0.75) * 2.0 - 1.0,
        (px * 0.75 + py * 0.25) * 2.0 - 1.0
    );
    if (flag(bokeh.noise)) {
        let k = vec2<f32>(12.9898, 78.233);
        n = vec2<f32>(
            clamp(fract(sin(dot(coord, k)) * 43758.5453), 0.0, 1.0) * 2.0 - 1.0,
            clamp(fract(sin(dot(coord, k * 2.0)) * 43758.5453), 0.0, 1.0) * 2.0 - 1.0
        );
    }
    return n;
}

@fragment
fn fs_bokeh(in: VsOut) -> @location(0) vec4<f32> {
    let uv = in.uv;

    var depth = linearize(textureSampleLevel(t_depth, t_sampler, uv, 0.0).r);
    if (flag(bokeh.depthblur)) {
        depth = linearize(bdepth(uv));
    }

    var f_depth = bokeh.focal_depth;
    if (flag(bokeh.shader_focus)) {
        f_depth = linearize(textureSampleLevel(t_depth, t_sampler, bokeh.focus_coords, 0.0).r);
    }

    var blur = 0.0;
    if (flag(bokeh.manualdof)) {
        let a = depth - f_depth;
        let b = (a - FDOF_START) / FDOF_DIST;
        let c = (-a - NDOF_START) / NDOF_DIST;
        blur = select(c, b, a > 0.0);
    } else {
        let f = bokeh.focal_length;
        let d = f_depth * 1000.0;
        let o = depth * 1000.0;
        let a = (o * f) / (o - f);
        let b = (d * f) / (d - f);
        let c = (d - f) / (d * bokeh.fstop * COC);
        blur = abs(a - b) * c;
    }
    blur = clamp(blur, 0.0, 1.0);

    let noise = rand(uv) * bokeh.dithering * blur;
    let w = (1.0 / bokeh.texture_width) * blur * bokeh.maxblur + noise.x;
    let h = (1.0 / bokeh.texture_height) * blur * bokeh.maxblur + noise.y;

    var col = textureSampleLevel(t_color, t_sampler, uv, 0.0).rgb;
    if (blur >= 0.05) {
        var s = 1.0;
        let rings = f32(RINGS);
        for (var i = 1; i <= RINGS; i++) {
            let ring_samples = i * SAMPLES;
            let step = PI * 2.0 / f32(ring_samples);
            let fi = f32(i);
            for (var j = 0; j < ring_samples; j++) {
                let pw = cos(f32(j) * step) * fi;
                let ph = sin(f32(j) * step) * fi;
                var p = 1.0;
                if (flag(bokeh.pentagon)) {
                    p = penta(vec2<f32>(pw, ph));
                }
                let weight = mix(1.0, fi / rings, bokeh.bias) * p;
                col += color(uv + vec2<f32>(pw * w, ph * h), blur) * weight;
                s += weight;
            }
        }
        col /= s;
    }

    if (flag(bokeh.show_focus)) {
        col = debug_focus(col, blur, depth);
    }
    if (flag(bokeh.vignetting)) {
        col *= vignette(uv);
    }

    return vec4<f32>(encode_output(col), 1.0);
}
"#;

/// Bokeh source with the kernel shape and output stage baked in.
pub fn bokeh_shader_source(quality: ShaderQuality, output: OutputOptions) -> String {
    let mut source = format!(
        "const RINGS: i32 = {};\nconst SAMPLES: i32 = {};\n",
        quality.rings, quality.samples
    );
    source.push_str(&output.prelude());
    source.push_str(OUTPUT_LIB);
    source.push_str(BOKEH_SHADER);
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_constants_substituted() {
        let src = bokeh_shader_source(ShaderQuality::new(3, 7), OutputOptions::LINEAR);
        assert!(src.starts_with("const RINGS: i32 = 3;\nconst SAMPLES: i32 = 7;\n"));
        assert!(src.contains("const TONE_MAPPING: bool = false;"));
        assert!(src.contains("fn encode_output"));
        assert!(src.contains("fn fs_bokeh"));
    }

    #[test]
    fn test_uniform_struct_matches_slots() {
        // Field order of the WGSL block follows BokehUniforms
        let fields = [
            "focus_coords", "texture_width", "texture_height", "focal_depth", "focal_length",
            "fstop", "maxblur", "show_focus", "manualdof", "vignetting", "depthblur",
            "threshold", "gain", "bias", "fringe", "znear", "zfar", "noise", "dithering",
            "pentagon", "shader_focus",
        ];
        let mut last = 0;
        for field in fields {
            let pos = BOKEH_SHADER
                .find(&format!("    {field}: "))
                .unwrap_or_else(|| panic!("missing {field}"));
            assert!(pos > last, "{field} out of order");
            last = pos;
        }
    }

    #[test]
    fn test_depth_shader_entry_points() {
        assert!(DEPTH_SHADER.contains("fn vs_depth"));
        assert!(DEPTH_SHADER.contains("fn fs_depth"));
        assert!(DEPTH_SHADER.contains("m_near"));
    }
}
