use crate::types::{Rating, Timestamp};

/// Constants used by the negative sampler.
pub mod sampler {
    /// Negatives drawn per dev/test row unless configured otherwise.
    pub const DEFAULT_NEGATIVES_PER_ROW: usize = 99;
    /// Candidate batch size per rejection round, as a multiple of K.
    pub const DEFAULT_BATCH_FACTOR: usize = 2;
    /// Hard cap on rejection rounds per row.
    pub const DEFAULT_MAX_ROUNDS: usize = 256;
    /// Below `eligible * SPARSE_POOL_DIVISOR < universe` the eligible pool is
    /// materialized instead of rejection-sampled.
    pub const SPARSE_POOL_DIVISOR: usize = 4;
}

/// Constants used when filling missing timestamps per source role.
pub mod roles {
    use super::Timestamp;

    /// Time assigned to train-role interactions without their own timestamp.
    pub const TRAIN_TIME: Timestamp = 1;
    /// Time assigned to dev-role interactions without their own timestamp.
    pub const DEV_TIME: Timestamp = 2;
    /// Time assigned to test-role interactions without their own timestamp.
    pub const TEST_TIME: Timestamp = 3;
    /// Time assigned to simulated interactions without their own timestamp.
    pub const SIMULATED_TIME: Timestamp = 1;
}

/// Constants used by variant policies and user scoping.
pub mod variants {
    use super::Rating;

    /// Minimum rating for a simulated interaction to count as high quality.
    pub const DEFAULT_RATING_THRESHOLD: Rating = 4;
    /// Minimum train interactions for a user to be considered active.
    pub const DEFAULT_MIN_INTERACTIONS: usize = 15;
    /// Seed used when drawing a capped subset of active users.
    pub const DEFAULT_SUBSET_SEED: u64 = 42;
    /// Human-only variant name.
    pub const ORIGINAL_VARIANT: &str = "AgentRec_Original";
    /// Human plus rating-filtered simulated interactions.
    pub const ENHANCED_VARIANT: &str = "AgentRec_Enhanced";
    /// Human plus every simulated interaction.
    pub const ALL_VARIANT: &str = "Agent4Rec_All";
}

/// Constants used by the tabular writer.
pub mod output {
    /// Train table file name.
    pub const TRAIN_FILE: &str = "train.csv";
    /// Dev table file name.
    pub const DEV_FILE: &str = "dev.csv";
    /// Test table file name.
    pub const TEST_FILE: &str = "test.csv";
    /// Field delimiter for every table.
    pub const DELIMITER: u8 = b'\t';
    /// Header of the train table.
    pub const TRAIN_HEADER: [&str; 3] = ["user_id", "item_id", "time"];
    /// Header of dev and test tables.
    pub const EVAL_HEADER: [&str; 4] = ["user_id", "item_id", "time", "neg_items"];
    /// Prefix for staging directories created next to published variants.
    pub const STAGING_PREFIX: &str = ".staging-";
    /// Directory inside a staging dir that receives the new tables.
    pub const STAGED_DIR: &str = "new";
    /// Directory inside a staging dir that parks the replaced variant.
    pub const RETIRED_DIR: &str = "old";
}

/// Constants used by source readers.
pub mod sources {
    /// Extension of per-user simulation log files.
    pub const SIMULATION_LOG_EXTENSION: &str = "json";
    /// Key holding viewed item ids inside a simulation log page.
    pub const WATCH_KEY: &str = "watch_id";
    /// Key holding ratings inside a simulation log page.
    pub const RATING_KEY: &str = "rating";
    /// Log message used when malformed records are skipped.
    pub const SKIP_MALFORMED_MSG: &str = "skipping malformed interaction record";
}
