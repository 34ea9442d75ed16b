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

/// Destructure a variant of an enum into local bindings, panicking if `$enum` is any other variant.
///
/// ```edition2021
/// # use tari_test_utils::unpack_enum;
/// #[derive(Debug)]
/// enum Event {
///     Announced(u32),
///     Swept { reason: &'static str, enqueued: usize },
///     Stopped,
/// }
///
/// unpack_enum!(Event::Announced(id) = Event::Announced(7));
/// assert_eq!(id, 7);
///
/// unpack_enum!(Event::Swept { reason, enqueued } = Event::Swept { reason: "timer", enqueued: 3 });
/// assert_eq!(reason, "timer");
/// assert_eq!(enqueued, 3);
///
/// unpack_enum!(Event::Stopped = Event::Stopped);
/// ```
#[macro_export]
macro_rules! unpack_enum {
    ($($enum_key:ident)::+ { $($idents:tt),* } = $enum:expr) => {
        let ($($idents),+) = match $enum {
            $($enum_key)::+ { $($idents),+ } => ($($idents),+),
            v => panic!("Unexpected enum variant {:?} given to unpack_enum", v),
        };
    };
    ($($enum_key:ident)::+ ( $($idents:tt),* ) = $enum:expr) => {
        let ($($idents),+) = match $enum {
            $($enum_key)::+ ($($idents),+) => ($($idents),+),
            v => panic!("Unexpected enum variant {:?} given to unpack_enum", v),
        };
    };
    ($($enum_key:ident)::+ = $enum:expr) => {
        match $enum {
            $($enum_key)::+ => {},
            v => panic!("Unexpected enum variant {:?} given to unpack_enum", v),
        };
    };
}
