/// Identifier of a user (human or simulated agent).
/// Examples: `1`, `5871`
pub type UserId = u64;
/// Identifier of an item in the catalogue.
/// Examples: `10`, `2310087`
pub type ItemId = u64;
/// Ordering value attached to an interaction.
/// Examples: `1` (train role default), `1700000000` (unix seconds)
pub type Timestamp = i64;
/// Explicit feedback attached to an interaction.
/// Examples: `2`, `5`
pub type Rating = i32;
/// Identifier for the source that produced an interaction.
/// Examples: `train`, `dev`, `agent`
pub type SourceId = String;
/// Name of an assembled dataset variant, also used as its output directory.
/// Examples: `AgentRec_Original`, `AgentRec_Enhanced`
pub type VariantName = String;
/// Warning/log message text.
/// Examples: `user token 'abc' is not a non-negative integer`
pub type LogMessage = String;
