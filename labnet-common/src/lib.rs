pub mod codec;
pub mod errors;
pub mod utils;

pub use codec::{BincodeCodec, Codec, JsonCodec};
pub use errors::CodecError;
pub use utils::{EndName, ServerName};
