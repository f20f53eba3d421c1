/// The segmentation editor core: tool modes, in-flight bookkeeping and
/// the pure transitions between user intents and remote call outcomes.

pub mod session;
