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

/// Repeatedly evaluate an async expression until it equals `expect`, sleeping for `interval` between attempts.
/// Panics once `max_attempts` evaluations have not produced the expected value.
///
/// ```edition2021
/// # use std::{sync::atomic::{AtomicUsize, Ordering}, time::Duration};
/// # use tari_test_utils::async_assert_eventually;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let counter = AtomicUsize::new(0);
/// async_assert_eventually!(
///     counter.fetch_add(1, Ordering::SeqCst) + 1,
///     expect = 3,
///     max_attempts = 5,
///     interval = Duration::from_millis(1)
/// );
/// # }
/// ```
#[macro_export]
macro_rules! async_assert_eventually {
    ($check_expr:expr, expect = $expect:expr, max_attempts = $max_attempts:expr, interval = $interval:expr $(,)?) => {{
        let mut attempts = 0;
        let mut value = $check_expr;
        while value != $expect {
            attempts += 1;
            if attempts >= $max_attempts {
                panic!(
                    "assert_eventually assertion failed. Expression did not equal value after {} attempts. Last \
                     value: {:?}",
                    attempts, value
                );
            }
            $crate::__tokio::time::sleep($interval).await;
            value = $check_expr;
        }
    }};
    ($check_expr:expr, expect = $expect:expr $(,)?) => {{
        $crate::async_assert_eventually!(
            $check_expr,
            expect = $expect,
            max_attempts = 10,
            interval = std::time::Duration::from_millis(100)
        );
    }};
}
