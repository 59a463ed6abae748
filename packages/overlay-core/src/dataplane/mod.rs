//! Frame data-plane: wire codec, relay fanout, origin emission, and
//! client-side reassembly (§3 FramePacket, §4.4, §4.5).

pub mod client;
pub mod frame;
pub mod origin;
pub mod relay;

pub use client::{
    first_pop_with_catalogue, run_client_frame_receiver, run_client_probe_loop,
    run_client_selector_loop, CatalogueChoice,
};
pub use frame::{
    chunk_count, decode_chunk, encode_chunk, peek_video_id, split_frame, DecodedChunk,
};
pub use origin::{run_origin_emitter, VideoSource};
pub use relay::run_relay_fanout;
