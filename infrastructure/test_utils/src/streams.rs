// Copyright 2024, The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{collections::HashMap, hash::Hash};

/// Count the occurrences of each item.
pub fn get_item_counts<I>(items: I) -> HashMap<I::Item, usize>
where
    I: IntoIterator,
    I::Item: Hash + Eq,
{
    items.into_iter().fold(HashMap::new(), |mut counts, item| {
        *counts.entry(item).or_insert(0) += 1;
        counts
    })
}

/// Receive `take` items from an mpsc receiver, panicking if they do not all arrive within `timeout`. Without
/// `take`, items are received until the channel closes.
///
/// ```edition2021
/// # use std::time::Duration;
/// # use tari_test_utils::collect_recv;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// for i in 1..10 {
///     tx.send(i).unwrap();
/// }
/// let items = collect_recv!(rx, take = 3, timeout = Duration::from_secs(1));
/// assert_eq!(items, vec![1, 2, 3]);
/// # }
/// ```
#[macro_export]
macro_rules! collect_recv {
    ($rx:expr, take=$take:expr, timeout=$timeout:expr $(,)?) => {{
        let take = $take;
        let mut items = Vec::with_capacity(take);
        let result = $crate::__tokio::time::timeout($timeout, async {
            while items.len() < take {
                match $rx.recv().await {
                    Some(item) => items.push(item),
                    None => break,
                }
            }
        })
        .await;
        if result.is_err() || items.len() < take {
            panic!(
                "Timeout or channel closed before receiving {} item(s). Received {}",
                take,
                items.len()
            );
        }
        items
    }};
    ($rx:expr, timeout=$timeout:expr $(,)?) => {{
        let mut items = Vec::new();
        $crate::__tokio::time::timeout($timeout, async {
            while let Some(item) = $rx.recv().await {
                items.push(item);
            }
        })
        .await
        .expect("Channel did not close within timeout");
        items
    }};
}

/// Receive `take` items from a broadcast receiver, skipping over lag notifications. Panics if the items do not
/// arrive within `timeout`.
#[macro_export]
macro_rules! collect_try_recv {
    ($rx:expr, take=$take:expr, timeout=$timeout:expr $(,)?) => {{
        use $crate::__tokio::sync::broadcast::error::RecvError;
        let take = $take;
        let mut items = Vec::with_capacity(take);
        let result = $crate::__tokio::time::timeout($timeout, async {
            while items.len() < take {
                match $rx.recv().await {
                    Ok(item) => items.push(item),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
        .await;
        if result.is_err() || items.len() < take {
            panic!(
                "Timeout or channel closed before receiving {} item(s). Received {}",
                take,
                items.len()
            );
        }
        items
    }};
}
