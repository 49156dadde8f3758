/// Hierarchical taxonomy node identifier.
/// Examples: `Top/Arts`, `Top/Science/Biology/Genetics`
pub type Topic = String;
/// Resource locator attached to a topic.
/// Example: `http://www.awn.com/`
pub type Link = String;
/// External catalog identifier of a topic (the DMOZ `catid`).
/// Examples: `2`, `174012`
pub type StableId = String;
/// Relation element name used in the structure dump.
/// Examples: `narrow`, `narrow1`, `symbolic`
pub type RelationTag = String;
/// Directory name of an exported topic pair.
/// Example: `Exp_1622_42350`
pub type PairDirName = String;
/// Components used to build configuration fingerprints.
/// Example: `Top/Arts|Top/Science|bfs|200`
pub type HashPart = String;
