
/// Returns a token identifying the current thread.
///
/// The token is never 0, so 0 can be used as the "no owner" sentinel.
///
/// The token is the address of a thread-local byte. Addresses of distinct
/// live thread-locals are distinct, so two threads whose lifetimes overlap
/// always observe different tokens.
///
/// A token can be reused after its thread terminates: a later thread may be
/// allocated the same thread-local slot. In that case the termination of the
/// first thread happens before the start of the second, so for the purpose of
/// lock ownership the two threads behave like one serial owner. The reentrant
/// kind relies only on this weaker property.
#[inline(always)]
pub(crate) fn owner_token() -> usize {
    thread_local!(static OWNER_TOKEN: u8 = const { 0 });
    OWNER_TOKEN.with(|token| {
        let token: *const u8 = token;
        token as usize
    })
}
