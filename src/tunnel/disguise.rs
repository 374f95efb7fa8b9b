//! Disguise packet payloads.
//!
//! Builders for the clientbound packets that make the tunnel look like a
//! real server: the post-login sequence (Login Success, Join Game, Player
//! Position), the ambient Keep-Alive and Time Update, and the Chunk Data
//! packet that carries the encrypted tunnel bytes wrapped in a plausible
//! NBT heightmap.
//!
//! The Join Game values are what a protocol-773 client expects to receive;
//! the server never interprets them.

use crate::codec::Writer;
use crate::crypto::SecureRandom;
use crate::motion::Walker;

/// Longs in a packed 256-entry, 9-bit heightmap (7 entries per long).
pub const HEIGHTMAP_LONGS: usize = 37;

/// The flat surface height every fabricated chunk reports.
const SURFACE_HEIGHT: i64 = 64;

/// Login Success: `[16-byte UUID][String username][VarInt 0]`.
///
/// The UUID is random — there is no account system behind it.
pub fn login_success(username: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_raw(&SecureRandom::bytes::<16>());
    w.write_string(username);
    w.write_var_int(0);
    w.into_inner()
}

/// Join Game with the fixed world shape for protocol 773.
pub fn join_game() -> Vec<u8> {
    let mut w = Writer::new();
    w.write_i32(100); // entity id
    w.write_bool(false); // hardcore
    w.write_var_int(1); // dimension count
    w.write_string("minecraft:overworld");
    w.write_var_int(0); // max players (unused)
    w.write_var_int(8); // view distance
    w.write_var_int(8); // simulation distance
    w.write_bool(false); // reduced debug info
    w.write_bool(true); // enable respawn screen
    w.write_bool(false); // limited crafting
    w.write_var_int(0); // dimension type
    w.write_string("minecraft:overworld");
    w.write_i64(123456789); // hashed seed
    w.write_u8(1); // game mode: creative
    w.write_u8(0xff); // previous game mode: none
    w.write_bool(false); // is debug
    w.write_bool(false); // is flat
    w.write_bool(false); // has death location
    w.write_var_int(0); // portal cooldown
    w.write_var_int(63); // sea level
    w.write_bool(false); // enforces secure chat
    w.into_inner()
}

/// Synchronize Player Position from the walker's current spot.
pub fn player_position(walker: &Walker) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_f64(walker.x());
    w.write_f64(walker.y());
    w.write_f64(walker.z());
    w.write_f32(walker.yaw_degrees());
    w.write_f32(0.0); // pitch
    w.write_u8(0x00); // flags: all absolute
    w.write_var_int(0); // teleport id
    w.into_inner()
}

/// Keep-Alive: `[int64 unix-nanos]`.
pub fn keep_alive(unix_nanos: i64) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_i64(unix_nanos);
    w.into_inner()
}

/// Time Update: `[int64 world_age][int64 time_of_day]`.
pub fn time_update(world_age: i64, time_of_day: i64) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_i64(world_age);
    w.write_i64(time_of_day);
    w.into_inner()
}

/// Pack a 9-bit height into all 256 heightmap positions.
///
/// Position `i` lands in long `i / 7` at bit offset `(i % 7) * 9`; the top
/// bit of each long stays unused, as the real format has it.
pub fn packed_heights(height: i64) -> [i64; HEIGHTMAP_LONGS] {
    let mut data = [0i64; HEIGHTMAP_LONGS];
    let value = height & 0x1ff;
    for position in 0..256 {
        data[position / 7] |= value << ((position % 7) * 9);
    }
    data
}

/// Chunk Data payload carrying an encrypted tunnel segment.
///
/// Layout: chunk coords, an NBT compound holding a `MOTION_BLOCKING` long
/// array, the VarInt-prefixed encrypted body, then the empty block-entity
/// count and six empty light masks.
pub fn chunk_data(chunk_x: i32, chunk_z: i32, sealed: &[u8]) -> Vec<u8> {
    let mut w = Writer::with_capacity(8 + 24 + HEIGHTMAP_LONGS * 8 + sealed.len() + 12);
    w.write_i32(chunk_x);
    w.write_i32(chunk_z);

    w.write_u8(0x0a); // TAG_Compound
    w.write_raw(&[0x00, 0x00]); // empty name
    w.write_u8(0x0c); // TAG_Long_Array
    w.write_nbt_string("MOTION_BLOCKING");
    w.write_i32(HEIGHTMAP_LONGS as i32);
    for long in packed_heights(SURFACE_HEIGHT) {
        w.write_i64(long);
    }
    w.write_u8(0x00); // TAG_End

    w.write_var_int(sealed.len() as i32);
    w.write_raw(sealed);

    w.write_var_int(0); // block entities
    for _ in 0..6 {
        w.write_var_int(0); // sky/block light masks and arrays
    }
    w.into_inner()
}
