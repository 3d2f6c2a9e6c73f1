/*!
 * Exchange format shared with the translation agent.
 *
 * - `codec`: request encoding and request/response decoding
 * - `prompt`: optional instruction wrapper around a request
 */

pub mod codec;
pub mod prompt;

pub use codec::{
    CodecError, DecodedDocument, DecodedEntry, Header, RequestHeader, ResponseHeader, decode, encode,
    encode_response,
};
pub use prompt::PromptTemplate;
