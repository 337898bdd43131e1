pub mod time;

use nanoid::nanoid;

/// Generate a short random token, used by the `{{$random}}` template variable.
pub fn short_token() -> String {
    nanoid!(10)
}

/// Generate a unique execution id.
#[allow(unused)]
pub fn longid() -> String {
    nanoid!(21)
}
