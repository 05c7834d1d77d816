use anyhow::{Context, Result};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 连接到已开启远程调试的浏览器，并取得考试页面
///
/// 优先复用 URL 以 `exam_url` 开头的已打开页面（考生可能已经登录），否则新开一个页面。
pub async fn connect_to_exam_page(port: u16, exam_url: &str) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url)
        .await
        .map_err(|e| {
            error!("连接浏览器失败: {}", e);
            e
        })
        .with_context(|| format!("无法连接到调试端口 {}", port))?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await.context("获取页面列表失败")?;
    debug!("获取到 {} 个页面", pages.len());

    for page in pages {
        if let Ok(Some(url)) = page.url().await {
            debug!("检查页面: {}", url);
            if url.starts_with(exam_url) {
                info!("✓ 复用已打开的考试页面: {}", url);
                return Ok((browser, page));
            }
        }
    }

    debug!("未找到考试页面，新开页面并导航到: {}", exam_url);
    let page = browser
        .new_page(exam_url)
        .await
        .with_context(|| format!("打开考试页面失败: {}", exam_url))?;
    info!("已导航到: {}", exam_url);

    Ok((browser, page))
}
