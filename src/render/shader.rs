//! WGSL declarations shared with the raycast consumer
//!
//! The prelude is generated from the Rust constants so the shader side of
//! the index, brick and queue formats cannot drift from the host side.
//! Prepend it to any shader that reads the index table or requests bricks.

use crate::render::buffer::GpuWorldConfig;
use crate::voxel::brick::WORD_BITS;
use crate::voxel::streaming::index_table::{SLOT_BITS, SLOT_MASK, TAG_EMPTY, TAG_RESIDENT, TAG_UNLOADED};
use crate::voxel::streaming::request_queue::{ENTRY_SIZE, HEADER_SIZE};

/// Bind group layout expected by `wgsl_prelude`
pub const BINDING_WORLD_CONFIG: u32 = 0;
pub const BINDING_INDEX_TABLE: u32 = 1;
pub const BINDING_BRICK_POOL: u32 = 2;
pub const BINDING_LOAD_QUEUE: u32 = 3;

/// Generate the WGSL prelude for bind group `group`
pub fn wgsl_prelude(group: u32) -> String {
    debug_assert_eq!(GpuWorldConfig::SIZE, 16);
    debug_assert_eq!(HEADER_SIZE, 16);
    debug_assert_eq!(ENTRY_SIZE, 16);

    format!(
        r#"// Generated brick streaming prelude

const SLOT_BITS: u32 = {slot_bits}u;
const SLOT_MASK: u32 = {slot_mask:#010x}u;
const TAG_UNLOADED: u32 = {tag_unloaded}u;
const TAG_EMPTY: u32 = {tag_empty}u;
const TAG_RESIDENT: u32 = {tag_resident}u;
const BRICK_WORD_BITS: u32 = {word_bits}u;

struct WorldConfig {{
    grid_dims: vec3<i32>,
    voxels_per_brick_axis: i32,
}}

struct LoadQueue {{
    count: atomic<u32>,
    capacity: u32,
    _reserved: vec2<u32>,
    entries: array<vec4<i32>>,
}}

@group({group}) @binding({b_config}) var<storage, read> world_config: WorldConfig;
@group({group}) @binding({b_index}) var<storage, read> index_table: array<u32>;
@group({group}) @binding({b_pool}) var<storage, read> brick_pool: array<u32>;
@group({group}) @binding({b_queue}) var<storage, read_write> load_queue: LoadQueue;

fn entry_tag(entry: u32) -> u32 {{
    return entry >> SLOT_BITS;
}}

fn entry_slot(entry: u32) -> u32 {{
    return entry & SLOT_MASK;
}}

fn cell_in_grid(cell: vec3<i32>) -> bool {{
    return all(cell >= vec3<i32>(0)) && all(cell < world_config.grid_dims);
}}

fn cell_index(cell: vec3<i32>) -> u32 {{
    let d = world_config.grid_dims;
    return u32(cell.x + cell.y * d.x + cell.z * d.x * d.y);
}}

fn brick_words() -> u32 {{
    let m = u32(world_config.voxels_per_brick_axis);
    return (m * m * m + BRICK_WORD_BITS - 1u) / BRICK_WORD_BITS;
}}

fn brick_voxel_solid(slot: u32, voxel: vec3<u32>) -> bool {{
    let m = u32(world_config.voxels_per_brick_axis);
    let bit = voxel.x + voxel.y * m + voxel.z * m * m;
    let word = brick_pool[slot * brick_words() + bit / BRICK_WORD_BITS];
    return (word & (1u << (bit % BRICK_WORD_BITS))) != 0u;
}}

fn request_brick(cell: vec3<i32>) {{
    let index = atomicAdd(&load_queue.count, 1u);
    if (index < load_queue.capacity) {{
        load_queue.entries[index] = vec4<i32>(cell, 0);
    }}
}}
"#,
        slot_bits = SLOT_BITS,
        slot_mask = SLOT_MASK,
        tag_unloaded = TAG_UNLOADED,
        tag_empty = TAG_EMPTY,
        tag_resident = TAG_RESIDENT,
        word_bits = WORD_BITS,
        group = group,
        b_config = BINDING_WORLD_CONFIG,
        b_index = BINDING_INDEX_TABLE,
        b_pool = BINDING_BRICK_POOL,
        b_queue = BINDING_LOAD_QUEUE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_constants() {
        let src = wgsl_prelude(0);
        assert!(src.contains("const SLOT_BITS: u32 = 28u;"));
        assert!(src.contains("const SLOT_MASK: u32 = 0x0fffffffu;"));
        assert!(src.contains("const TAG_UNLOADED: u32 = 1u;"));
        assert!(src.contains("const TAG_EMPTY: u32 = 2u;"));
        assert!(src.contains("const TAG_RESIDENT: u32 = 4u;"));
        assert!(src.contains("const BRICK_WORD_BITS: u32 = 32u;"));
    }

    #[test]
    fn test_prelude_bindings() {
        let src = wgsl_prelude(2);
        assert!(src.contains("@group(2) @binding(1) var<storage, read> index_table"));
        assert!(src.contains("@group(2) @binding(3) var<storage, read_write> load_queue"));
        assert!(src.contains("atomicAdd(&load_queue.count, 1u)"));
    }

    #[test]
    fn test_prelude_braces_balanced() {
        let src = wgsl_prelude(0);
        assert_eq!(src.matches('{').count(), src.matches('}').count());
    }
}
