use pretty_assertions::assert_eq;
use serde_json::json;
use slator_core::markdown::match_link;
use slator_core::{
    DataTransfer, Document, Editor, Node, PluginRegistry, Point, Selection, images, is_image_url,
    kinds,
};

fn editor_with(children: Vec<Node>, focus: Vec<usize>, offset: usize) -> Editor {
    Editor::new(
        Document { children },
        Selection::collapsed(Point::new(focus, offset)),
        PluginRegistry::richtext(),
    )
}

/// `(url, text)` of every link in document order.
fn links(editor: &Editor) -> Vec<(String, String)> {
    editor
        .doc()
        .elements()
        .into_iter()
        .filter(|(_, el)| el.kind == kinds::LINK)
        .map(|(_, el)| {
            let text: String = el.children.iter().map(Node::string).collect();
            (el.attr_str("url").unwrap_or_default().to_string(), text)
        })
        .collect()
}

#[test]
fn typed_markdown_link_becomes_a_link_node() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("[bing](http://bing.com)").unwrap();

    assert_eq!(
        links(&editor),
        vec![("http://bing.com".to_string(), "bing".to_string())]
    );
    assert_eq!(editor.doc().children[0].string(), "bing");
    assert_eq!(editor.doc().children.len(), 1);
}

#[test]
fn typed_markdown_image_becomes_an_image_node() {
    let mut editor = Editor::with_richtext_plugins();
    editor
        .type_text(r#"![alt](http://x.com/a.png "cap")"#)
        .unwrap();

    let found = images(editor.doc());
    assert_eq!(found.len(), 1);
    let (path, attrs) = &found[0];
    assert_eq!(path, &vec![0]);
    assert_eq!(attrs.alt, "alt");
    assert_eq!(attrs.url.as_deref(), Some("http://x.com/a.png"));
    assert_eq!(attrs.title.as_deref(), Some("cap"));
    assert!(!attrs.id.is_empty());
    assert_eq!(editor.doc().children[1], Node::paragraph(""));
    assert_eq!(editor.selection().focus.path, vec![1, 0]);
}

#[test]
fn link_keeps_surrounding_text() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("see [docs](https://d.io 'Docs') now").unwrap();

    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert_eq!(block.kind, kinds::PARAGRAPH);
    assert_eq!(editor.doc().children[0].string(), "see docs now");
    let link = block
        .children
        .iter()
        .filter_map(Node::as_element)
        .find(|el| el.kind == kinds::LINK)
        .unwrap();
    assert_eq!(link.attr_str("url"), Some("https://d.io"));
    assert_eq!(link.attr_str("title"), Some("Docs"));
}

#[test]
fn link_inside_a_list_item_stays_in_the_list() {
    let mut editor = editor_with(
        vec![Node::element(
            kinds::BULLETED_LIST,
            vec![Node::element(kinds::LIST_ITEM, vec![Node::text("go [x](http://x.io")])],
        )],
        vec![0, 0, 0],
        18,
    );
    editor.insert_text(")").unwrap();

    assert_eq!(editor.doc().children.len(), 1);
    assert_eq!(editor.doc().children[0].string(), "go x");
    assert_eq!(links(&editor), vec![("http://x.io".to_string(), "x".to_string())]);
}

#[test]
fn incomplete_link_syntax_is_literal() {
    let mut editor = Editor::with_richtext_plugins();
    editor.type_text("[a] (b) [](c)").unwrap();

    assert!(links(&editor).is_empty());
    assert_eq!(editor.doc().children, vec![Node::paragraph("[a] (b) [](c)")]);
}

#[test]
fn link_matcher_reports_the_span() {
    let found = match_link("text ![cat](//cdn.io/c.gif").unwrap();
    assert!(found.is_image);
    assert_eq!(found.caption, "cat");
    assert_eq!(found.url, "//cdn.io/c.gif");
    assert_eq!(found.title, None);
    assert_eq!(found.start, 5);
}

#[test]
fn whole_url_typed_at_once_is_linked() {
    let mut editor = Editor::with_richtext_plugins();
    editor.insert_text("https://example.com/page").unwrap();

    assert_eq!(
        links(&editor),
        vec![(
            "https://example.com/page".to_string(),
            "https://example.com/page".to_string()
        )]
    );
}

#[test]
fn pasted_page_url_is_linked_and_image_url_is_embedded() {
    let mut editor = Editor::with_richtext_plugins();
    editor
        .insert_data(&DataTransfer::text("https://example.com"))
        .unwrap();
    assert_eq!(links(&editor).len(), 1);
    assert!(images(editor.doc()).is_empty());

    let mut editor = Editor::with_richtext_plugins();
    editor
        .insert_data(&DataTransfer::text(" https://example.com/photo.jpg "))
        .unwrap();
    let found = images(editor.doc());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1.url.as_deref(), Some("https://example.com/photo.jpg"));
    assert!(links(&editor).is_empty());
}

#[test]
fn image_url_detection() {
    assert!(is_image_url("https://x.io/a/b.webp?size=2"));
    assert!(is_image_url("//x.io/a.PNG"));
    assert!(!is_image_url("https://x.io/a.html"));
    assert!(!is_image_url("https://x.io"));
    assert!(!is_image_url("photo.png"));
}

#[test]
fn link_commands_wrap_query_and_unwrap() {
    let mut editor = editor_with(vec![Node::paragraph("see docs")], vec![0, 0], 4);
    editor.set_selection(Selection::new(
        Point::new(vec![0, 0], 4),
        Point::new(vec![0, 0], 8),
    ));

    editor
        .run_command("link.insert", Some(json!({ "url": "https://d.io" })))
        .unwrap();
    assert_eq!(links(&editor), vec![("https://d.io".to_string(), "docs".to_string())]);

    let (link_path, _) = editor
        .doc()
        .elements()
        .into_iter()
        .find(|(_, el)| el.kind == kinds::LINK)
        .unwrap();
    let mut inside = link_path.clone();
    inside.push(0);
    editor.set_selection(Selection::collapsed(Point::new(inside, 1)));

    assert!(editor.run_query::<bool>("link.is_active", None).unwrap());
    assert_eq!(
        editor.run_query::<Option<String>>("link.url", None).unwrap(),
        Some("https://d.io".to_string())
    );

    editor.run_command("link.unwrap", None).unwrap();
    assert!(links(&editor).is_empty());
    assert_eq!(editor.doc().children, vec![Node::paragraph("see docs")]);
    assert!(!editor.run_query::<bool>("link.is_active", None).unwrap());
}

#[test]
fn link_insert_at_a_collapsed_cursor_uses_the_text() {
    let mut editor = Editor::with_richtext_plugins();
    editor
        .run_command(
            "link.insert",
            Some(json!({ "url": "https://d.io", "text": "docs" })),
        )
        .unwrap();
    assert_eq!(links(&editor), vec![("https://d.io".to_string(), "docs".to_string())]);

    let err = editor.run_command("link.insert", None).unwrap_err();
    assert_eq!(err.message(), "Missing args.url");
}

#[test]
fn image_commands_and_queries() {
    let mut editor = Editor::with_richtext_plugins();
    editor
        .run_command(
            "image.insert_url",
            Some(json!({ "url": "https://x.io/a.png", "alt": "a" })),
        )
        .unwrap();

    let listed: Vec<serde_json::Value> = editor.run_query("image.list", None).unwrap();
    assert_eq!(listed.len(), 1);
    let id = images(editor.doc())[0].1.id.clone();

    editor
        .run_command("image.set_alt", Some(json!({ "id": id, "alt": "b" })))
        .unwrap();
    assert_eq!(images(editor.doc())[0].1.alt, "b");

    assert!(editor.undo());
    assert_eq!(images(editor.doc())[0].1.alt, "a");
}
