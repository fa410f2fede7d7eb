//! WGSL sources for every pipeline pass.
//!
//! All programs share one bind group layout: the frame block at binding 0,
//! an optional pass block at binding 1, six 2D textures at bindings 2-7 and
//! a nearest sampler at binding 8. Struct layouts mirror
//! `wonderlands_render::uniforms`.

use wonderlands_render::ShaderPass;

const PRELUDE: &str = r#"
struct Frame {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    sun_direction: vec4<f32>,
    sun_color: vec4<f32>,
    fog: vec4<f32>,
    viewport: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> frame: Frame;
@group(0) @binding(2) var t0: texture_2d<f32>;
@group(0) @binding(3) var t1: texture_2d<f32>;
@group(0) @binding(4) var t2: texture_2d<f32>;
@group(0) @binding(5) var t3: texture_2d<f32>;
@group(0) @binding(6) var t4: texture_2d<f32>;
@group(0) @binding(7) var t5: texture_2d<f32>;
@group(0) @binding(8) var nearest: sampler;

fn luminance(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.2126, 0.7152, 0.0722));
}
"#;

const MESH_INPUT: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
    @location(7) color: vec4<f32>,
};

fn instance_model(instance: InstanceInput) -> mat4x4<f32> {
    return mat4x4<f32>(instance.model_0, instance.model_1, instance.model_2, instance.model_3);
}
"#;

const FULLSCREEN: &str = r#"
struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: FullscreenOutput;
    out.position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}
"#;

const GBUFFER: &str = r#"
struct GBufferVarying {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

struct GBufferOut {
    @location(0) position: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) albedo: vec4<f32>,
    @location(3) material: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> GBufferVarying {
    let model = instance_model(instance);
    let world = model * vec4<f32>(vertex.position, 1.0);
    var out: GBufferVarying;
    out.clip_position = frame.view_proj * world;
    out.world_position = world.xyz;
    out.world_normal = (model * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.color = instance.color;
    return out;
}

@fragment
fn fs_main(in: GBufferVarying) -> GBufferOut {
    var out: GBufferOut;
    // w = 1 marks covered texels for the later passes
    out.position = vec4<f32>(in.world_position, 1.0);
    out.normal = vec4<f32>(normalize(in.world_normal), 1.0);
    out.albedo = vec4<f32>(in.color.rgb, 1.0);
    out.material = vec4<f32>(0.4, 0.25, 0.0, 1.0);
    return out;
}
"#;

const SHADOW_MAP: &str = r#"
struct ShadowVarying {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) depth: f32,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> ShadowVarying {
    let clip = frame.light_view_proj * instance_model(instance) * vec4<f32>(vertex.position, 1.0);
    var out: ShadowVarying;
    out.clip_position = clip;
    out.depth = clip.z / clip.w;
    return out;
}

@fragment
fn fs_main(in: ShadowVarying) -> @location(0) vec4<f32> {
    return vec4<f32>(in.depth, 0.0, 0.0, 1.0);
}
"#;

const SSAO: &str = r#"
struct Ssao {
    samples: array<vec4<f32>, 64>,
    params: vec4<f32>,
    count: vec4<u32>,
};

@group(0) @binding(1) var<uniform> ssao: Ssao;

@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let world = textureSampleLevel(t0, nearest, in.uv, 0.0);
    if (world.w == 0.0) {
        return vec4<f32>(1.0);
    }
    let origin = (frame.view * vec4<f32>(world.xyz, 1.0)).xyz;
    let normal = normalize((frame.view * vec4<f32>(textureSampleLevel(t1, nearest, in.uv, 0.0).xyz, 0.0)).xyz);

    let noise_cell = vec2<i32>(fract(in.uv * ssao.params.zw) * 4.0);
    let random = vec3<f32>(textureLoad(t2, noise_cell, 0).xy, 0.0);
    let tangent = normalize(random - normal * dot(random, normal));
    let bitangent = cross(normal, tangent);
    let tbn = mat3x3<f32>(tangent, bitangent, normal);

    let radius = ssao.params.x;
    let bias = ssao.params.y;
    var occlusion = 0.0;
    for (var i = 0u; i < ssao.count.x; i = i + 1u) {
        let probe = origin + tbn * ssao.samples[i].xyz * radius;
        let projected = frame.projection * vec4<f32>(probe, 1.0);
        let ndc = projected.xy / projected.w;
        let probe_uv = ndc * vec2<f32>(0.5, -0.5) + vec2<f32>(0.5);
        let hit = textureSampleLevel(t0, nearest, probe_uv, 0.0);
        let hit_depth = (frame.view * vec4<f32>(hit.xyz, 1.0)).z;
        let in_range = smoothstep(0.0, 1.0, radius / max(abs(origin.z - hit_depth), 1e-4));
        if (hit.w > 0.0 && hit_depth >= probe.z + bias) {
            occlusion = occlusion + in_range;
        }
    }
    let ao = 1.0 - occlusion / f32(max(ssao.count.x, 1u));
    return vec4<f32>(ao, ao, ao, 1.0);
}
"#;

const SSAO_BLUR: &str = r#"
@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let texel = 1.0 / vec2<f32>(textureDimensions(t0));
    var total = 0.0;
    for (var x = -2; x < 2; x = x + 1) {
        for (var y = -2; y < 2; y = y + 1) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            total = total + textureSampleLevel(t0, nearest, in.uv + offset, 0.0).r;
        }
    }
    let ao = total / 16.0;
    return vec4<f32>(ao, ao, ao, 1.0);
}
"#;

const LIGHTING: &str = r#"
struct Light {
    position_range: vec4<f32>,
    direction_kind: vec4<f32>,
    color_intensity: vec4<f32>,
    cone: vec4<f32>,
};

struct Lights {
    lights: array<Light, 64>,
    count: vec4<u32>,
};

@group(0) @binding(1) var<uniform> lights: Lights;

fn shadow_factor(world: vec3<f32>, normal: vec3<f32>) -> f32 {
    let clip = frame.light_view_proj * vec4<f32>(world, 1.0);
    let ndc = clip.xyz / clip.w;
    let uv = ndc.xy * vec2<f32>(0.5, -0.5) + vec2<f32>(0.5);
    if (any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0)) || ndc.z > 1.0) {
        return 0.0;
    }
    let slope = 1.0 - max(dot(normal, frame.sun_direction.xyz), 0.0);
    let bias = max(frame.params.y * 10.0 * slope, frame.params.y);
    let texel = 1.0 / vec2<f32>(textureDimensions(t5));
    var shadow = 0.0;
    for (var x = -1; x <= 1; x = x + 1) {
        for (var y = -1; y <= 1; y = y + 1) {
            let stored = textureSampleLevel(t5, nearest, uv + vec2<f32>(f32(x), f32(y)) * texel, 0.0).r;
            if (ndc.z - bias > stored) {
                shadow = shadow + 1.0;
            }
        }
    }
    return shadow / 9.0;
}

fn blinn_phong(light_dir: vec3<f32>, normal: vec3<f32>, view_dir: vec3<f32>, albedo: vec3<f32>, spec: vec2<f32>) -> vec3<f32> {
    let diffuse = max(dot(normal, light_dir), 0.0) * albedo;
    let halfway = normalize(light_dir + view_dir);
    let shininess = max(spec.y * 128.0, 1.0);
    let specular = pow(max(dot(normal, halfway), 0.0), shininess) * spec.x;
    return diffuse + vec3<f32>(specular);
}

@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let world = textureSampleLevel(t0, nearest, in.uv, 0.0);
    if (world.w == 0.0) {
        return vec4<f32>(frame.fog.rgb, 1.0);
    }
    let normal = normalize(textureSampleLevel(t1, nearest, in.uv, 0.0).xyz);
    let albedo = textureSampleLevel(t2, nearest, in.uv, 0.0).rgb;
    let spec = textureSampleLevel(t3, nearest, in.uv, 0.0).xy;
    let ao = textureSampleLevel(t4, nearest, in.uv, 0.0).r;
    let view_dir = normalize(frame.camera_position.xyz - world.xyz);
    let daylight = frame.sun_direction.w;

    var color = albedo * (0.08 + 0.2 * daylight) * ao;

    let sun = frame.sun_color.rgb * frame.sun_color.w;
    let lit = 1.0 - shadow_factor(world.xyz, normal);
    color = color + sun * lit * blinn_phong(frame.sun_direction.xyz, normal, view_dir, albedo, spec);

    for (var i = 0u; i < lights.count.x; i = i + 1u) {
        let l = lights.lights[i];
        let kind = l.direction_kind.w;
        let radiance = l.color_intensity.rgb * l.color_intensity.w;
        if (kind < 0.5) {
            // shadow-casting directional lights are the sun, already applied
            if (l.cone.z > 0.5) {
                continue;
            }
            color = color + radiance * blinn_phong(-normalize(l.direction_kind.xyz), normal, view_dir, albedo, spec);
            continue;
        }
        let to_light = l.position_range.xyz - world.xyz;
        let dist = length(to_light);
        let light_dir = to_light / max(dist, 1e-4);
        let falloff = clamp(1.0 - dist / l.position_range.w, 0.0, 1.0);
        var attenuation = falloff * falloff;
        if (kind > 1.5) {
            let theta = dot(light_dir, -normalize(l.direction_kind.xyz));
            let epsilon = max(l.cone.x - l.cone.y, 1e-4);
            attenuation = attenuation * clamp((theta - l.cone.y) / epsilon, 0.0, 1.0);
        }
        color = color + radiance * attenuation * blinn_phong(light_dir, normal, view_dir, albedo, spec);
    }

    let view_dist = length(frame.camera_position.xyz - world.xyz);
    let fog = 1.0 - exp(-view_dist * frame.fog.w);
    return vec4<f32>(mix(color, frame.fog.rgb, clamp(fog, 0.0, 1.0)), 1.0);
}
"#;

const SKYBOX: &str = r#"
struct SkyVarying {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) direction: vec3<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> SkyVarying {
    let rotation = mat3x3<f32>(frame.view[0].xyz, frame.view[1].xyz, frame.view[2].xyz);
    let clip = frame.projection * vec4<f32>(rotation * vertex.position, 1.0);
    var out: SkyVarying;
    // z = w pins the hull to the far plane
    out.clip_position = clip.xyww;
    out.direction = vertex.position;
    return out;
}

@fragment
fn fs_main(in: SkyVarying) -> @location(0) vec4<f32> {
    let dir = normalize(in.direction);
    let daylight = frame.sun_direction.w;
    let zenith = mix(vec3<f32>(0.01, 0.01, 0.03), vec3<f32>(0.2, 0.4, 0.8), daylight);
    let height = clamp(dir.y, 0.0, 1.0);
    var color = mix(frame.fog.rgb, zenith, pow(height, 0.5));
    let sun = pow(max(dot(dir, frame.sun_direction.xyz), 0.0), 512.0);
    color = color + frame.sun_color.rgb * sun * 4.0 * daylight;
    return vec4<f32>(color, 1.0);
}
"#;

const FORWARD: &str = r#"
struct Forward {
    clip_plane: vec4<f32>,
};

@group(0) @binding(1) var<uniform> forward: Forward;

struct ForwardVarying {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> ForwardVarying {
    let model = instance_model(instance);
    let world = model * vec4<f32>(vertex.position, 1.0);
    var out: ForwardVarying;
    out.clip_position = frame.view_proj * world;
    out.world_position = world.xyz;
    out.world_normal = normalize((model * vec4<f32>(vertex.normal, 0.0)).xyz);
    out.color = instance.color;
    return out;
}

@fragment
fn fs_main(in: ForwardVarying) -> @location(0) vec4<f32> {
    if (dot(forward.clip_plane.xyz, in.world_position) + forward.clip_plane.w < 0.0) {
        discard;
    }
    let daylight = frame.sun_direction.w;
    let diffuse = max(dot(normalize(in.world_normal), frame.sun_direction.xyz), 0.0);
    let light = 0.1 + 0.2 * daylight + diffuse * frame.sun_color.w;
    let view_dist = length(frame.camera_position.xyz - in.world_position);
    let fog = clamp(1.0 - exp(-view_dist * frame.fog.w), 0.0, 1.0);
    return vec4<f32>(mix(in.color.rgb * light, frame.fog.rgb, fog), 1.0);
}
"#;

const WATER: &str = r#"
struct Water {
    surface: vec4<f32>,
    grid: vec4<f32>,
};

@group(0) @binding(1) var<uniform> water: Water;

struct WaterVarying {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) screen: vec4<f32>,
    @location(2) velocity: vec2<f32>,
};

fn flow_at(xz: vec2<f32>) -> vec4<f32> {
    let size = i32(water.grid.w);
    let local = (xz - water.grid.xy) / water.grid.z * water.grid.w;
    let cell = clamp(vec2<i32>(floor(local)), vec2<i32>(0), vec2<i32>(size - 1));
    return textureLoad(t0, cell, 0);
}

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> WaterVarying {
    var world = instance_model(instance) * vec4<f32>(vertex.position, 1.0);
    let flow = flow_at(world.xz);
    let phase = (world.x + world.z) * water.surface.z + frame.params.x * 0.5;
    world.y = world.y + water.surface.y * sin(phase) + flow.z * 0.05;
    let clip = frame.view_proj * world;
    var out: WaterVarying;
    out.clip_position = clip;
    out.world_position = world.xyz;
    out.screen = clip;
    out.velocity = flow.xy;
    return out;
}

@fragment
fn fs_main(in: WaterVarying) -> @location(0) vec4<f32> {
    let ndc = in.screen.xy / in.screen.w;
    let refract_uv = ndc * vec2<f32>(0.5, -0.5) + vec2<f32>(0.5);
    let reflect_uv = vec2<f32>(refract_uv.x, 1.0 - refract_uv.y);
    let ripple = sin(water.surface.w * 6.2831853 + in.world_position.x * 0.7) * 0.004;
    let distortion = clamp(in.velocity * 0.02, vec2<f32>(-0.05), vec2<f32>(0.05)) + vec2<f32>(ripple);
    let clamp_lo = vec2<f32>(0.001);
    let clamp_hi = vec2<f32>(0.999);
    let reflection = textureSampleLevel(t1, nearest, clamp(reflect_uv + distortion, clamp_lo, clamp_hi), 0.0).rgb;
    let refraction = textureSampleLevel(t2, nearest, clamp(refract_uv + distortion, clamp_lo, clamp_hi), 0.0).rgb;

    let view_dir = normalize(frame.camera_position.xyz - in.world_position);
    let fresnel = pow(1.0 - max(view_dir.y, 0.0), 2.0);
    let tint = vec3<f32>(0.0, 0.3, 0.5);
    let color = mix(mix(refraction, tint, 0.2), reflection, fresnel);
    let glint = pow(max(dot(reflect(-frame.sun_direction.xyz, vec3<f32>(0.0, 1.0, 0.0)), view_dir), 0.0), 64.0);
    return vec4<f32>(color + frame.sun_color.rgb * glint * frame.sun_direction.w, 0.9);
}
"#;

const PARTICLE: &str = r#"
struct ParticleVarying {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> ParticleVarying {
    var out: ParticleVarying;
    out.clip_position = frame.view_proj * instance_model(instance) * vec4<f32>(vertex.position, 1.0);
    out.color = instance.color;
    return out;
}

@fragment
fn fs_main(in: ParticleVarying) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color.rgb * 0.6, 1.0);
}
"#;

const POST_BLOCK: &str = r#"
struct Post {
    tone: vec4<f32>,
    focus: vec4<f32>,
    flags: vec4<u32>,
};

@group(0) @binding(1) var<uniform> post: Post;
"#;

const BRIGHT_PASS: &str = r#"
@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(t0, nearest, in.uv, 0.0).rgb;
    if (luminance(color) > post.tone.z) {
        return vec4<f32>(color, 1.0);
    }
    return vec4<f32>(0.0, 0.0, 0.0, 1.0);
}
"#;

const BLUR: &str = r#"
struct Blur {
    direction: vec4<f32>,
};

@group(0) @binding(1) var<uniform> blur: Blur;

@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let texel = 1.0 / vec2<f32>(textureDimensions(t0));
    var stride = vec2<f32>(0.0, texel.y);
    if (blur.direction.x > 0.5) {
        stride = vec2<f32>(texel.x, 0.0);
    }
    var color = textureSampleLevel(t0, nearest, in.uv, 0.0).rgb * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = stride * f32(i);
        color = color + textureSampleLevel(t0, nearest, in.uv + offset, 0.0).rgb * weights[i];
        color = color + textureSampleLevel(t0, nearest, in.uv - offset, 0.0).rgb * weights[i];
    }
    return vec4<f32>(color, 1.0);
}
"#;

const POST_PROCESS: &str = r#"
fn hdr_at(uv: vec2<f32>) -> vec3<f32> {
    return textureSampleLevel(t0, nearest, uv, 0.0).rgb;
}

fn antialias(uv: vec2<f32>, texel: vec2<f32>) -> vec3<f32> {
    let centre = hdr_at(uv);
    let n = hdr_at(uv + vec2<f32>(0.0, -texel.y));
    let s = hdr_at(uv + vec2<f32>(0.0, texel.y));
    let e = hdr_at(uv + vec2<f32>(texel.x, 0.0));
    let w = hdr_at(uv + vec2<f32>(-texel.x, 0.0));
    let lumas = vec4<f32>(luminance(n), luminance(s), luminance(e), luminance(w));
    let lo = min(luminance(centre), min(min(lumas.x, lumas.y), min(lumas.z, lumas.w)));
    let hi = max(luminance(centre), max(max(lumas.x, lumas.y), max(lumas.z, lumas.w)));
    if (hi - lo < max(0.0312, hi * 0.125)) {
        return centre;
    }
    return (centre * 4.0 + n + s + e + w) / 8.0;
}

fn defocus(uv: vec2<f32>, texel: vec2<f32>) -> vec3<f32> {
    var total = vec3<f32>(0.0);
    for (var x = -2; x <= 2; x = x + 1) {
        for (var y = -2; y <= 2; y = y + 1) {
            total = total + hdr_at(uv + vec2<f32>(f32(x), f32(y)) * texel * 2.0);
        }
    }
    return total / 25.0;
}

fn god_rays(uv: vec2<f32>) -> f32 {
    let sun_world = frame.camera_position.xyz + frame.sun_direction.xyz * 1000.0;
    let sun_clip = frame.view_proj * vec4<f32>(sun_world, 1.0);
    if (sun_clip.w <= 0.0) {
        return 0.0;
    }
    let sun_uv = sun_clip.xy / sun_clip.w * vec2<f32>(0.5, -0.5) + vec2<f32>(0.5);
    let delta = (sun_uv - uv) / 32.0;
    var coord = uv;
    var decay = 1.0;
    var rays = 0.0;
    for (var i = 0; i < 32; i = i + 1) {
        coord = coord + delta;
        let covered = textureSampleLevel(t2, nearest, clamp(coord, vec2<f32>(0.0), vec2<f32>(1.0)), 0.0).w;
        rays = rays + (1.0 - covered) * decay;
        decay = decay * 0.95;
    }
    return rays / 32.0;
}

@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let texel = frame.viewport.zw;
    var color = hdr_at(in.uv);
    if (post.flags.z != 0u) {
        color = antialias(in.uv, texel);
    }
    if (post.flags.y != 0u) {
        let world = textureSampleLevel(t2, nearest, in.uv, 0.0);
        var focus_dist = post.focus.x + post.focus.y;
        if (world.w > 0.0) {
            focus_dist = length(world.xyz - frame.camera_position.xyz);
        }
        let amount = clamp(abs(focus_dist - post.focus.x) / max(post.focus.y, 1e-3), 0.0, 1.0);
        color = mix(color, defocus(in.uv, texel), amount);
    }
    if (post.flags.x != 0u) {
        color = color + textureSampleLevel(t1, nearest, in.uv, 0.0).rgb * post.tone.y;
    }
    if (post.flags.w != 0u && frame.sun_direction.w > 0.0) {
        color = color + frame.sun_color.rgb * god_rays(in.uv) * 0.3 * frame.sun_direction.w;
    }
    let mapped = vec3<f32>(1.0) - exp(-color * post.tone.x);
    return vec4<f32>(mapped, 1.0);
}
"#;

/// Whether `pass` draws registered meshes (as opposed to a fullscreen triangle).
pub fn uses_mesh_input(pass: ShaderPass) -> bool {
    matches!(
        pass,
        ShaderPass::GBuffer
            | ShaderPass::ShadowMap
            | ShaderPass::Skybox
            | ShaderPass::Water
            | ShaderPass::Particle
            | ShaderPass::Forward
    )
}

/// Full WGSL module for `pass`, with `vs_main` and `fs_main` entry points.
pub fn shader_source(pass: ShaderPass) -> String {
    let body = match pass {
        ShaderPass::GBuffer => GBUFFER,
        ShaderPass::ShadowMap => SHADOW_MAP,
        ShaderPass::Ssao => SSAO,
        ShaderPass::SsaoBlur => SSAO_BLUR,
        ShaderPass::Lighting => LIGHTING,
        ShaderPass::Skybox => SKYBOX,
        ShaderPass::Water => WATER,
        ShaderPass::Particle => PARTICLE,
        ShaderPass::Forward => FORWARD,
        ShaderPass::BrightPass => BRIGHT_PASS,
        ShaderPass::Blur => BLUR,
        ShaderPass::PostProcess => POST_PROCESS,
    };
    let input = if uses_mesh_input(pass) {
        MESH_INPUT
    } else {
        FULLSCREEN
    };
    let post = if matches!(pass, ShaderPass::BrightPass | ShaderPass::PostProcess) {
        POST_BLOCK
    } else {
        ""
    };
    [PRELUDE, input, post, body].concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pass_has_both_entry_points() {
        for pass in ShaderPass::ALL {
            let src = shader_source(pass);
            assert!(src.contains("fn vs_main("), "{pass} lacks vs_main");
            assert!(src.contains("fn fs_main("), "{pass} lacks fs_main");
            assert_eq!(src.matches("fn vs_main(").count(), 1, "{pass}");
        }
    }

    #[test]
    fn pass_blocks_bind_where_their_uniforms_go() {
        for (pass, name) in [
            (ShaderPass::Ssao, "var<uniform> ssao"),
            (ShaderPass::Lighting, "var<uniform> lights"),
            (ShaderPass::Blur, "var<uniform> blur"),
            (ShaderPass::BrightPass, "var<uniform> post"),
            (ShaderPass::PostProcess, "var<uniform> post"),
            (ShaderPass::Water, "var<uniform> water"),
            (ShaderPass::Forward, "var<uniform> forward"),
        ] {
            let src = shader_source(pass);
            assert!(src.contains(&format!("@group(0) @binding(1) {name}")), "{pass}");
        }
        assert!(!shader_source(ShaderPass::GBuffer).contains("@binding(1)"));
    }

    #[test]
    fn gbuffer_writes_four_targets() {
        let src = shader_source(ShaderPass::GBuffer);
        for loc in 0..4 {
            assert!(src.contains(&format!("@location({loc}) ")));
        }
    }

    #[test]
    fn fullscreen_passes_skip_vertex_buffers() {
        assert!(!uses_mesh_input(ShaderPass::Lighting));
        assert!(!shader_source(ShaderPass::PostProcess).contains("InstanceInput"));
        assert!(shader_source(ShaderPass::Water).contains("InstanceInput"));
    }
}
