//! Streaming merge-join of two sorted enumerations.
//!
//! Memory use is O(1) beyond the two current records; an absent side
//! compares as greater than any key.

use anyhow::Result;
use tokio::sync::mpsc;

use crate::enumerate::ObjectRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinedPair {
    SourceOnly(ObjectRecord),
    DestinationOnly(ObjectRecord),
    Both {
        src: ObjectRecord,
        dst: ObjectRecord,
    },
}

impl JoinedPair {
    pub fn key(&self) -> &str {
        match self {
            JoinedPair::SourceOnly(record) => &record.key,
            JoinedPair::DestinationOnly(record) => &record.key,
            JoinedPair::Both { src, .. } => &src.key,
        }
    }
}

pub struct MergeJoin {
    src: mpsc::Receiver<Result<ObjectRecord>>,
    dst: mpsc::Receiver<Result<ObjectRecord>>,
    next_src: Option<ObjectRecord>,
    next_dst: Option<ObjectRecord>,
    primed: bool,
}

impl MergeJoin {
    pub fn new(
        src: mpsc::Receiver<Result<ObjectRecord>>,
        dst: mpsc::Receiver<Result<ObjectRecord>>,
    ) -> Self {
        Self {
            src,
            dst,
            next_src: None,
            next_dst: None,
            primed: false,
        }
    }

    async fn pull(rx: &mut mpsc::Receiver<Result<ObjectRecord>>) -> Result<Option<ObjectRecord>> {
        match rx.recv().await {
            Some(item) => item.map(Some),
            None => Ok(None),
        }
    }

    /// The next joined pair in key order; `None` once both sides are
    /// exhausted. An enumeration failure on either side surfaces here.
    pub async fn next(&mut self) -> Result<Option<JoinedPair>> {
        if !self.primed {
            self.next_src = Self::pull(&mut self.src).await?;
            self.next_dst = Self::pull(&mut self.dst).await?;
            self.primed = true;
        }
        // an absent side compares as greater than any key
        let order = match (&self.next_src, &self.next_dst) {
            (None, None) => return Ok(None),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(src_record), Some(dst_record)) => src_record.key.cmp(&dst_record.key),
        };
        let pair = match order {
            std::cmp::Ordering::Less => {
                let src = self.next_src.take().unwrap();
                self.next_src = Self::pull(&mut self.src).await?;
                JoinedPair::SourceOnly(src)
            }
            std::cmp::Ordering::Greater => {
                let dst = self.next_dst.take().unwrap();
                self.next_dst = Self::pull(&mut self.dst).await?;
                JoinedPair::DestinationOnly(dst)
            }
            std::cmp::Ordering::Equal => {
                let src = self.next_src.take().unwrap();
                let dst = self.next_dst.take().unwrap();
                self.next_src = Self::pull(&mut self.src).await?;
                self.next_dst = Self::pull(&mut self.dst).await?;
                JoinedPair::Both { src, dst }
            }
        };
        Ok(Some(pair))
    }
}
