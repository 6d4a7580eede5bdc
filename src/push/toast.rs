//! Toast notification body for summarized delivery.

use jabgate_proto::escape;

/// Page the notification opens on the device.
pub const TOAST_TARGET_PAGE: &str = "/Chat.xaml";

/// Render the toast document showing `title` over `text`.
pub fn render(title: &str, text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <wp:Notification xmlns:wp=\"WPNotification\"><wp:Toast>\
         <wp:Text1>{}</wp:Text1><wp:Text2>{}</wp:Text2>\
         <wp:Param>{TOAST_TARGET_PAGE}</wp:Param>\
         </wp:Toast></wp:Notification>",
        escape(title),
        escape(text),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use jabgate_proto::Element;

    #[test]
    fn test_toast_fields() {
        let xml = render("Bea", "see you at 5");
        let body = xml.split_once('\n').unwrap().1;
        let doc = Element::parse(body).unwrap();
        let toast = doc.child("Toast").unwrap();
        assert_eq!(toast.child_text("Text1"), Some("Bea"));
        assert_eq!(toast.child_text("Text2"), Some("see you at 5"));
        assert_eq!(toast.child_text("Param"), Some(TOAST_TARGET_PAGE));
    }

    #[test]
    fn test_toast_escapes_markup() {
        let xml = render("<Bea & co>", "1 < 2 \"quoted\"");
        let body = xml.split_once('\n').unwrap().1;
        let toast = Element::parse(body).unwrap();
        let toast = toast.child("Toast").unwrap();
        assert_eq!(toast.child_text("Text1"), Some("<Bea & co>"));
        assert_eq!(toast.child_text("Text2"), Some("1 < 2 \"quoted\""));
    }
}
