pub mod types;
pub mod error;
pub mod table;
pub mod text;
pub mod maximize;
pub mod parallel;
pub mod em;
pub mod ibm1;
pub mod ibm2;
pub mod hmm;
pub mod decode;
pub mod pipeline;

pub use error::{AlignError, AlignResult};
pub use em::{EmConfig, Supervision};
pub use pipeline::{TrainOptions, TrainedModels, train};
pub use table::{Counts, DistortionTable, ProbTable, TranslationTable};
pub use text::{Bitext, CoOccurrence, PartialAlignments, co_occurrence, parse_plaintext, parse_partial_alignments, write_alignments};
