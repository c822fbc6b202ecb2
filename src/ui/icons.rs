//! Shared status icons with plain-text fallbacks.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[FAIL]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");

pub static FILE_MOD: Emoji<'_, '_> = Emoji("📝 ", "~");
pub static FILE_DEL: Emoji<'_, '_> = Emoji("🗑️  ", "-");

pub static LOCK: Emoji<'_, '_> = Emoji("🔒 ", "[LOCK]");
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static SHIP: Emoji<'_, '_> = Emoji("🚀 ", "[SHIP]");
