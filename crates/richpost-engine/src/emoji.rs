//! The emoji picker's palette.
//!
//! Picking one inserts it as plain text at the caret
//! ([`Cmd::InsertEmoji`](crate::commands::Cmd::InsertEmoji)).

pub const EMOJI_PALETTE: &[&str] = &[
    "😀", "😃", "😄", "😁", "😆", "😅", "😂", "🤣", "😊", "😇", "🙂", "🙃", "😉", "😌", "😍", "🥰",
    "😘", "😗", "😙", "😚", "😋", "😛", "😝", "😜", "🤪", "🤨", "🧐", "🤓", "😎", "🤩", "🥳", "😏",
    "😒", "😞", "😔", "😟", "😕", "🙁", "☹️", "😣", "😖", "😫", "😩", "🥺", "😢", "😭", "😤", "😠",
    "😡", "🤬", "🤯", "😳", "🥵", "🥶", "😱", "😨", "😰", "😥", "😓", "🤗", "🤔", "🤭", "🤫", "🤥",
    "😶", "😐", "😑", "😬", "🙄", "😯", "😦", "😧", "😮", "😲", "🥱", "😴", "🤤", "😪", "😵", "🤐",
    "🥴", "🤢", "🤮", "🤧", "😷", "🤒", "🤕", "🤑", "🤠", "😈", "👿", "👹", "👺", "🤡", "💩", "👻",
    "💀", "☠️", "👽", "👾", "🤖", "🎃", "😺", "😸", "👋", "🤚", "🖐️", "✋", "🖖", "👌", "🤌", "🤏",
    "✌️", "🤞", "🤟", "🤘", "🤙", "👈", "👉", "👆", "🖕", "👇", "☝️", "👍", "👎", "✊", "👊", "🤛",
    "🤜", "👏", "🙌", "👐", "🤲", "🤝", "🙏", "✍️", "💪", "🦾", "❤️", "🧡", "💛", "💚", "💙", "💜",
    "🖤", "🤍", "🤎", "💔", "💕", "💞", "💓", "💗", "⭐", "🌟", "✨", "⚡", "🔥", "💥", "💫", "🌈",
    "⚽", "🏀", "🏈", "⚾", "🎾", "🏐", "🥊", "🥋", "🏋️", "🤸", "🧘", "🏊", "🚣", "🎯", "🎮", "🎲",
    "✅", "❌", "❎", "✔️", "☑️", "💯", "🔴", "🟢",
];

/// Palette entry `index`, wrapping around.
pub fn emoji_at(index: usize) -> &'static str {
    EMOJI_PALETTE[index % EMOJI_PALETTE.len()]
}
