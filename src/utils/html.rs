use ammonia;

/// Sanitizes authored rich-text (level, quiz and reward descriptions)
/// before it is stored.
///
/// Whitelist-based: safe tags like <b> and <p> survive, <script>/<iframe>
/// and event-handler attributes are stripped. Admin input still goes through
/// here; an admin account takeover should not become stored XSS.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
