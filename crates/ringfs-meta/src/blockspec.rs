//! Block layer spec parsing.
//!
//! A spec is a comma separated stack of layers applied to file blocks, read
//! top to bottom, e.g. `crc,base` or `rep=3,crc,base`. The stack always ends
//! with the `base` layer, which stores the raw block.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::MetaError;

/// A single layer in a block layer stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockLayer {
    /// Stores the block itself.
    Base,
    /// Checksums the block below it.
    Crc,
    /// Replicates the block to the given number of peers.
    Replication(u32),
}

impl fmt::Display for BlockLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockLayer::Base => write!(f, "base"),
            BlockLayer::Crc => write!(f, "crc"),
            BlockLayer::Replication(n) => write!(f, "rep={}", n),
        }
    }
}

/// A validated block layer stack.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockLayerSpec {
    layers: Vec<BlockLayer>,
}

impl BlockLayerSpec {
    /// Parses a comma separated spec string.
    pub fn parse(spec: &str) -> Result<Self, MetaError> {
        let layers = spec
            .split(',')
            .map(|part| parse_layer(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        match layers.iter().position(|l| *l == BlockLayer::Base) {
            Some(i) if i == layers.len() - 1 => Ok(Self { layers }),
            Some(_) => Err(MetaError::InvalidArgument(format!(
                "block spec '{}': base must be the last layer",
                spec
            ))),
            None => Err(MetaError::InvalidArgument(format!(
                "block spec '{}' has no base layer",
                spec
            ))),
        }
    }

    /// The layers, top first.
    pub fn layers(&self) -> &[BlockLayer] {
        &self.layers
    }
}

impl FromStr for BlockLayerSpec {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BlockLayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, layer) in self.layers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", layer)?;
        }
        Ok(())
    }
}

fn parse_layer(part: &str) -> Result<BlockLayer, MetaError> {
    match part {
        "base" => Ok(BlockLayer::Base),
        "crc" => Ok(BlockLayer::Crc),
        "" => Err(MetaError::InvalidArgument("empty block layer".into())),
        other => {
            let count = other
                .strip_prefix("rep=")
                .ok_or_else(|| MetaError::InvalidArgument(format!("unknown block layer '{}'", other)))?;
            match count.parse::<u32>() {
                Ok(n) if n > 0 => Ok(BlockLayer::Replication(n)),
                _ => Err(MetaError::InvalidArgument(format!(
                    "invalid replication count in '{}'",
                    other
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default() {
        let spec = BlockLayerSpec::parse("crc,base").unwrap();
        assert_eq!(spec.layers(), &[BlockLayer::Crc, BlockLayer::Base]);
        assert_eq!(spec.to_string(), "crc,base");
    }

    #[test]
    fn test_parse_with_whitespace_and_replication() {
        let spec: BlockLayerSpec = " rep=3 , crc,base ".parse().unwrap();
        assert_eq!(
            spec.layers(),
            &[BlockLayer::Replication(3), BlockLayer::Crc, BlockLayer::Base]
        );
        assert_eq!(spec.to_string(), "rep=3,crc,base");
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "crc", "base,crc", "base,base", "crc,,base", "zip,base", "rep=0,base", "rep=x,base"] {
            assert!(
                matches!(BlockLayerSpec::parse(bad), Err(MetaError::InvalidArgument(_))),
                "expected error for {:?}",
                bad
            );
        }
    }
}
